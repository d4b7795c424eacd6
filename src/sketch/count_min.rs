use crate::error::{Error, Result};
use crate::hash::PolynomialHash;

use super::MAX_LOG2_WIDTH;

/// Count-Min sketch: `depth` rows of `width` saturating-free `u32` counters.
///
/// `update` increments one cell per row; `get` returns the row-wise minimum,
/// which never underestimates the true count. The conservative-update
/// variant raises only the cells that equal the current minimum, trading a
/// small query-time bias for much less over-counting on skewed streams.
pub struct CountMinSketch {
    depth: usize,
    conservative: bool,
    width_mask: u32,
    /// `depth × width`, row-major.
    counts: Vec<u32>,
    hash_fn: PolynomialHash,
    hash_buf: Vec<u32>,
}

impl CountMinSketch {
    pub fn new(log2_width: u32, depth: u32, seed: u64, conservative: bool) -> Result<Self> {
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
        Ok(CountMinSketch {
            depth: depth as usize,
            conservative,
            width_mask: (width - 1) as u32,
            counts: vec![0; width * depth as usize],
            hash_fn: PolynomialHash::new(depth, seed),
            hash_buf: vec![0; depth as usize],
        })
    }

    /// Current estimate for `key`: minimum over the indexed cells.
    pub fn get(&mut self, key: u32) -> u32 {
        self.hash_fn.hash(&mut self.hash_buf, key);
        let width = self.width_mask as usize + 1;
        let mut min = u32::MAX;
        for (i, &h) in self.hash_buf.iter().enumerate() {
            min = min.min(self.counts[i * width + (h & self.width_mask) as usize]);
        }
        min
    }

    /// Counts one occurrence of `key` and returns the post-update estimate.
    pub fn update(&mut self, key: u32) -> u32 {
        self.hash_fn.hash(&mut self.hash_buf, key);
        let width = self.width_mask as usize + 1;

        if self.conservative {
            let mut c = u32::MAX;
            for (i, &h) in self.hash_buf.iter().enumerate() {
                c = c.min(self.counts[i * width + (h & self.width_mask) as usize]);
            }
            for (i, &h) in self.hash_buf.iter().enumerate() {
                let cell = &mut self.counts[i * width + (h & self.width_mask) as usize];
                *cell = (c + 1).max(*cell);
            }
            c + 1
        } else {
            let mut c = u32::MAX;
            for (i, &h) in self.hash_buf.iter().enumerate() {
                let cell = &mut self.counts[i * width + (h & self.width_mask) as usize];
                c = c.min(*cell);
                *cell += 1;
            }
            c + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_width() {
        assert!(CountMinSketch::new(31, 4, 1, false).is_err());
    }

    #[test]
    fn rejects_zero_depth() {
        assert!(CountMinSketch::new(4, 0, 1, false).is_err());
    }

    #[test]
    fn unseen_key_is_zero_when_sparse() {
        let mut sk = CountMinSketch::new(10, 4, 1, false).unwrap();
        sk.update(7);
        // One update in a 1024-wide table: an unrelated key almost surely
        // misses all four touched cells; even a collision stays one-sided.
        assert!(sk.get(12345) <= 1);
    }

    #[test]
    fn never_underestimates() {
        let mut sk = CountMinSketch::new(6, 4, 1, false).unwrap();
        for _ in 0..50 {
            sk.update(3);
        }
        for k in 0..200u32 {
            sk.update(k);
        }
        assert!(sk.get(3) >= 51);
    }

    #[test]
    fn update_returns_post_update_estimate() {
        let mut sk = CountMinSketch::new(10, 4, 1, false).unwrap();
        assert_eq!(sk.update(42), 1);
        assert_eq!(sk.update(42), 2);
        assert_eq!(sk.get(42), 2);
    }

    #[test]
    fn conservative_monotone_and_dominated_by_plain() {
        let mut plain = CountMinSketch::new(4, 3, 9, false).unwrap();
        let mut consv = CountMinSketch::new(4, 3, 9, true).unwrap();

        let trace: Vec<u32> = (0..500).map(|i| i % 37).collect();
        let mut prev = 0;
        for &k in &trace {
            plain.update(k);
            consv.update(k);
            if k == 5 {
                let est = consv.get(5);
                assert!(est >= prev, "conservative estimate decreased");
                prev = est;
            }
        }

        for k in 0..37u32 {
            assert!(
                consv.get(k) <= plain.get(k),
                "conservative {} exceeds plain {} for key {k}",
                consv.get(k),
                plain.get(k),
            );
            assert!(consv.get(k) >= trace.iter().filter(|&&t| t == k).count() as u32);
        }
    }
}
