use crate::error::{Error, Result};
use crate::math::logistic_grad;

/// Floor for the per-step shrink factor `1 − lr·l2_reg`, so `scale` stays
/// positive even under degenerate `lr·l2_reg ≥ 1` configurations.
pub(crate) const MIN_SCALE_SHRINK: f32 = 1e-6;

#[inline]
pub(crate) fn scale_shrink(lr: f32, l2_reg: f32) -> f32 {
    (1.0 - lr * l2_reg).max(MIN_SCALE_SHRINK)
}

/// Dense online logistic regression with decoupled L2 regularization.
///
/// The stored vector `w` is related to the effective weights by
/// `effective = scale · w`. Each SGD step folds the multiplicative L2
/// shrinkage into `scale` alone and divides the gradient step by the new
/// scale, so per-step work is proportional to the example's sparsity
/// rather than the dimension.
///
/// Learning rate schedule: `lr_t = lr_init / (1 + lr_init·l2_reg·t)`.
pub struct LogisticRegression {
    weights: Vec<f32>,
    bias: f32,
    lr_init: f32,
    l2_reg: f32,
    scale: f32,
    t: u64,
    no_bias: bool,
}

impl LogisticRegression {
    pub fn new(dim: u32, lr_init: f32, l2_reg: f32, no_bias: bool) -> Result<Self> {
        if lr_init <= 0.0 {
            return Err(Error::InvalidLearningRate(lr_init));
        }
        Ok(LogisticRegression {
            weights: vec![0.0; dim as usize],
            bias: 0.0,
            lr_init,
            l2_reg,
            scale: 1.0,
            t: 0,
            no_bias,
        })
    }

    /// Effective weight of feature `key`. Panics when out of range.
    pub fn weight(&self, key: u32) -> f32 {
        self.scale * self.weights[key as usize]
    }

    /// `scale · ⟨w, x⟩` (bias not included).
    pub fn dot(&self, x: &[(u32, f32)]) -> f32 {
        if x.is_empty() {
            return 0.0;
        }
        let mut z = 0.0;
        for &(key, val) in x {
            z += self.weights[key as usize] * val;
        }
        z * self.scale
    }

    pub fn predict(&self, x: &[(u32, f32)]) -> bool {
        self.dot(x) + self.bias >= 0.0
    }

    /// One SGD step on `(x, label)`. Returns the pre-update prediction.
    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        let y = if label { 1.0 } else { -1.0 };
        let lr = self.lr();

        let mut z = 0.0;
        for &(key, val) in x {
            z += self.weights[key as usize] * val;
        }
        z = self.scale * z + self.bias;

        self.scale *= scale_shrink(lr, self.l2_reg);
        let g = logistic_grad(y * z);
        for &(key, val) in x {
            self.weights[key as usize] -= lr * y * g * val / self.scale;
        }

        if !self.no_bias {
            self.bias -= lr * y * g;
        }
        self.t += 1;
        z >= 0.0
    }

    /// One SGD step that also reports the post-update effective weights of
    /// the touched coordinates, in example order.
    pub fn update_with_weights(
        &mut self,
        out: &mut Vec<f32>,
        x: &[(u32, f32)],
        label: bool,
    ) -> bool {
        let yhat = self.update(x, label);
        out.clear();
        out.extend(x.iter().map(|&(key, _)| self.scale * self.weights[key as usize]));
        yhat
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    #[inline]
    fn lr(&self) -> f32 {
        self.lr_init / (1.0 + self.lr_init * self.l2_reg * self.t as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonpositive_learning_rate() {
        assert!(LogisticRegression::new(4, 0.0, 0.0, false).is_err());
        assert!(LogisticRegression::new(4, -0.1, 0.0, false).is_err());
    }

    #[test]
    fn first_step_moves_weight_toward_label() {
        let mut lr = LogisticRegression::new(2, 0.5, 0.0, false).unwrap();
        lr.update(&[(0, 1.0)], true);
        assert!(lr.weight(0) > 0.0, "positive label should push weight up");

        let mut lr = LogisticRegression::new(2, 0.5, 0.0, false).unwrap();
        lr.update(&[(0, 1.0)], false);
        assert!(lr.weight(0) < 0.0, "negative label should push weight down");
    }

    #[test]
    fn separates_two_disjoint_features() {
        let mut lr = LogisticRegression::new(2, 0.5, 0.0, false).unwrap();
        let mut errs = 0;
        for i in 0..200 {
            let (x, y): (&[(u32, f32)], bool) = if i % 2 == 0 {
                (&[(0, 1.0)], true)
            } else {
                (&[(1, 1.0)], false)
            };
            if lr.update(x, y) != y {
                errs += 1;
            }
        }
        assert!(lr.predict(&[(0, 1.0)]));
        assert!(!lr.predict(&[(1, 1.0)]));
        assert!((errs as f32) / 200.0 < 0.05, "online error rate {errs}/200");
    }

    #[test]
    fn no_bias_keeps_bias_zero() {
        let mut lr = LogisticRegression::new(2, 0.1, 1e-3, true).unwrap();
        for _ in 0..20 {
            lr.update(&[(0, 1.0)], true);
        }
        assert_eq!(lr.bias(), 0.0);
    }

    #[test]
    fn regularization_shrinks_effective_weight() {
        // Train one step, then feed unrelated examples; the decay of
        // `scale` must shrink feature 0's effective weight.
        let mut lr = LogisticRegression::new(3, 0.5, 0.1, false).unwrap();
        lr.update(&[(0, 1.0)], true);
        let w_before = lr.weight(0);
        for _ in 0..50 {
            lr.update(&[(1, 1.0)], true);
            lr.update(&[(2, 1.0)], false);
        }
        assert!(lr.weight(0).abs() < w_before.abs());
    }

    #[test]
    fn scale_survives_degenerate_shrink() {
        // lr·l2 = 2 > 1 would flip the scale negative without the clamp.
        let mut lr = LogisticRegression::new(1, 2.0, 1.0, false).unwrap();
        for _ in 0..5 {
            lr.update(&[(0, 1.0)], true);
        }
        assert!(lr.scale > 0.0);
        assert!(lr.weight(0).is_finite());
    }

    #[test]
    fn update_with_weights_reports_effective_values() {
        let mut lr = LogisticRegression::new(4, 0.5, 1e-3, false).unwrap();
        let mut out = Vec::new();
        lr.update_with_weights(&mut out, &[(1, 1.0), (3, 2.0)], true);
        assert_eq!(out.len(), 2);
        assert!((out[0] - lr.weight(1)).abs() < 1e-6);
        assert!((out[1] - lr.weight(3)).abs() < 1e-6);
    }
}
