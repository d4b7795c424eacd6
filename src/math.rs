//! Scalar helpers shared by the logistic learners and sketch queries.

/// Logistic function `1 / (1 + e^-x)`.
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Gradient of the logistic loss at margin `x`: `-sigmoid(-x)`.
///
/// Always in `(-1, 0)`, approaching `-1` for badly misclassified examples.
#[inline]
pub fn logistic_grad(x: f32) -> f32 {
    -sigmoid(-x)
}

/// Arithmetic mean, accumulated in f64 to keep row summaries stable for
/// deep sketches.
pub fn mean(buf: &[f32]) -> f32 {
    let n = buf.len();
    debug_assert!(n > 0);
    (buf.iter().map(|&w| w as f64).sum::<f64>() / n as f64) as f32
}

/// Median by partial selection; reorders `buf`.
///
/// For even lengths this is the mean of the two middle elements, matching
/// the unbiasedness argument for median-of-rows sketch queries.
pub fn median(buf: &mut [f32]) -> f32 {
    let n = buf.len();
    debug_assert!(n > 0);
    let (lo_half, mid, _) = buf.select_nth_unstable_by(n / 2, f32::total_cmp);
    let hi = *mid;
    if n % 2 == 1 {
        hi
    } else {
        let lo = lo_half.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        (lo + hi) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoid_is_centered() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn logistic_grad_bounds() {
        assert!(logistic_grad(0.0) < 0.0);
        assert!(logistic_grad(0.0) > -1.0);
        // Badly misclassified margin: gradient magnitude approaches 1.
        assert!(logistic_grad(-20.0) < -0.999);
    }

    #[test]
    fn median_odd_length() {
        let mut buf = [3.0, -1.0, 2.0];
        assert_eq!(median(&mut buf), 2.0);
    }

    #[test]
    fn median_even_length_averages_middle_pair() {
        let mut buf = [4.0, 1.0, 3.0, 2.0];
        assert!((median(&mut buf) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn median_single_element() {
        let mut buf = [7.5];
        assert_eq!(median(&mut buf), 7.5);
    }

    #[test]
    fn mean_matches_manual_sum() {
        let buf = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&buf) - 2.5).abs() < 1e-6);
    }
}
