use crate::error::{Error, Result};
use crate::hash::TabulationHash;
use crate::math::median;

use super::MAX_LOG2_WIDTH;

/// Signed Count-Sketch over f32 cells.
///
/// Each row's tabulation hash yields both a bucket (low `log2_width` bits)
/// and a Rademacher sign (high bit). Updates add `sign·delta` to one cell
/// per row; queries take the median of the sign-corrected row reads, which
/// bounds the tail error where a mean would not.
pub struct CountSketch {
    depth: usize,
    width_mask: u32,
    /// `depth × width`, row-major.
    weights: Vec<f32>,
    hash_fn: TabulationHash,
    hash_buf: Vec<u32>,
    read_buf: Vec<f32>,
}

/// Sign for a row hash: high bit set means `+1`.
#[inline]
pub(crate) fn sign_of(h: u32) -> f32 {
    if h >> 31 != 0 {
        1.0
    } else {
        -1.0
    }
}

impl CountSketch {
    pub fn new(log2_width: u32, depth: u32, seed: u64) -> Result<Self> {
        if log2_width > MAX_LOG2_WIDTH {
            return Err(Error::InvalidWidth {
                got: log2_width,
                min: 0,
            });
        }
        if depth == 0 {
            return Err(Error::InvalidDepth);
        }

        let width = 1usize << log2_width;
        Ok(CountSketch {
            depth: depth as usize,
            width_mask: (width - 1) as u32,
            weights: vec![0.0; width * depth as usize],
            hash_fn: TabulationHash::new(depth, seed),
            hash_buf: vec![0; depth as usize],
            read_buf: vec![0.0; depth as usize],
        })
    }

    /// Median of the sign-corrected row reads for `key`.
    pub fn get(&mut self, key: u32) -> f32 {
        self.hash_fn.hash(&mut self.hash_buf, key);
        let width = self.width_mask as usize + 1;
        for (i, &h) in self.hash_buf.iter().enumerate() {
            self.read_buf[i] = sign_of(h) * self.weights[i * width + (h & self.width_mask) as usize];
        }
        median(&mut self.read_buf)
    }

    /// Adds `sign·delta` to the indexed cell in every row.
    pub fn update(&mut self, key: u32, delta: f32) {
        self.hash_fn.hash(&mut self.hash_buf, key);
        let width = self.width_mask as usize + 1;
        for (i, &h) in self.hash_buf.iter().enumerate() {
            self.weights[i * width + (h & self.width_mask) as usize] += sign_of(h) * delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_dimensions() {
        assert!(CountSketch::new(31, 5, 1).is_err());
        assert!(CountSketch::new(4, 0, 1).is_err());
    }

    #[test]
    fn sign_is_deterministic_in_key() {
        let mut sk = CountSketch::new(4, 5, 1).unwrap();
        sk.update(7, 2.5);
        let first = sk.get(7);
        sk.update(7, 2.5);
        // Same signs on both updates: the estimate doubles instead of
        // cancelling.
        assert!((sk.get(7) - 2.0 * first).abs() < 1e-5);
    }

    #[test]
    fn median_recovers_heavy_key() {
        // Width 16, depth 5, one heavy key (+10) and one light (+0.1).
        let mut sk = CountSketch::new(4, 5, 1).unwrap();
        for _ in 0..10 {
            sk.update(7, 1.0);
        }
        sk.update(13, 0.1);

        let est = sk.get(7);
        assert!(
            (est - 10.0).abs() <= 0.1 + 1e-5,
            "estimate {est} too far from 10.0"
        );

        // Untouched key: median of reads is small noise.
        assert!(sk.get(8).abs() <= 0.1 + 1e-5);
    }

    #[test]
    fn linearity_without_collisions() {
        let mut once = CountSketch::new(8, 5, 3).unwrap();
        let mut twice = CountSketch::new(8, 5, 3).unwrap();
        once.update(99, 0.7);
        twice.update(99, 0.3);
        twice.update(99, 0.4);
        assert!((once.get(99) - twice.get(99)).abs() < 1e-6);
    }

    #[test]
    fn negative_deltas_cancel() {
        let mut sk = CountSketch::new(6, 5, 11).unwrap();
        sk.update(42, 1.5);
        sk.update(42, -1.5);
        assert!(sk.get(42).abs() < 1e-6);
    }
}
