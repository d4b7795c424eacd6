use crate::error::{Error, Result};
use crate::hash::PolynomialHash;

use super::MAX_LOG2_WIDTH;

/// Paired Count-Min: per-class occurrence counters for a log-odds proxy.
///
/// Two Count-Min tables of half width share one hash bank. Positive-label
/// updates land in the numerator table, negative-label updates in the
/// denominator. A query estimates
/// `p(x_k = 1 | y = +1) / p(x_k = 1 | y = -1)` as a ratio of smoothed
/// counts, normalized by the class prior; its log approximates the
/// feature's log-odds contribution.
pub struct PairedCountMin {
    depth: usize,
    smooth: f32,
    conservative: bool,
    width_mask: u32,
    /// Numerator (positive-class) cells, `depth × width` row-major.
    counts_pos: Vec<u32>,
    /// Denominator (negative-class) cells, same shape.
    counts_neg: Vec<u32>,
    pos_count: u32,
    neg_count: u32,
    hash_fn: PolynomialHash,
    hash_buf: Vec<u32>,
}

impl PairedCountMin {
    pub fn new(
        log2_width: u32,
        depth: u32,
        seed: u64,
        smooth: f32,
        conservative: bool,
    ) -> Result<Self> {
        // Two tables split one width budget, so the exponent must be ≥ 1.
        if !(1..=MAX_LOG2_WIDTH).contains(&log2_width) {
            return Err(Error::InvalidWidth {
                got: log2_width,
                min: 1,
            });
        }
        if depth == 0 {
            return Err(Error::InvalidDepth);
        }

        let width = 1usize << (log2_width - 1);
        Ok(PairedCountMin {
            depth: depth as usize,
            smooth,
            conservative,
            width_mask: (width - 1) as u32,
            counts_pos: vec![0; width * depth as usize],
            counts_neg: vec![0; width * depth as usize],
            pos_count: 0,
            neg_count: 0,
            hash_fn: PolynomialHash::new(depth, seed),
            hash_buf: vec![0; depth as usize],
        })
    }

    /// Smoothed class-prior ratio `(pos + s) / (neg + s)`.
    pub fn prior_ratio(&self) -> f32 {
        (self.pos_count as f32 + self.smooth) / (self.neg_count as f32 + self.smooth)
    }

    /// Prior-normalized likelihood ratio for `key`.
    pub fn get(&mut self, key: u32) -> f32 {
        self.hash_fn.hash(&mut self.hash_buf, key);
        let width = self.width_mask as usize + 1;

        let mut num = u32::MAX;
        let mut den = u32::MAX;
        for (i, &h) in self.hash_buf.iter().enumerate() {
            let j = i * width + (h & self.width_mask) as usize;
            num = num.min(self.counts_pos[j]);
            den = den.min(self.counts_neg[j]);
        }

        let ratio = (num as f32 + self.smooth) / (den as f32 + self.smooth);
        ratio / self.prior_ratio()
    }

    /// Counts one example and returns the predicted label.
    ///
    /// The prediction is the sign of the class prior (`prior_ratio >= 1`);
    /// per-feature evidence is not consulted.
    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        if label {
            self.pos_count += 1;
        } else {
            self.neg_count += 1;
        }
        for &(key, _) in x {
            self.update_feature(key, label);
        }
        self.prior_ratio() >= 1.0
    }

    /// Like [`update`](Self::update), but also writes each feature's
    /// post-update ratio estimate into `out`.
    pub fn update_with_weights(
        &mut self,
        out: &mut Vec<f32>,
        x: &[(u32, f32)],
        label: bool,
    ) -> bool {
        if label {
            self.pos_count += 1;
        } else {
            self.neg_count += 1;
        }
        out.clear();
        for &(key, _) in x {
            let ratio = self.update_feature(key, label);
            out.push(ratio);
        }
        self.prior_ratio() >= 1.0
    }

    fn update_feature(&mut self, key: u32, label: bool) -> f32 {
        self.hash_fn.hash(&mut self.hash_buf, key);
        let width = self.width_mask as usize + 1;

        let table = if label {
            &mut self.counts_pos
        } else {
            &mut self.counts_neg
        };

        let mut updated = u32::MAX;
        if self.conservative {
            for (i, &h) in self.hash_buf.iter().enumerate() {
                updated = updated.min(table[i * width + (h & self.width_mask) as usize]);
            }
            updated += 1;
            for (i, &h) in self.hash_buf.iter().enumerate() {
                let cell = &mut table[i * width + (h & self.width_mask) as usize];
                *cell = updated.max(*cell);
            }
        } else {
            for (i, &h) in self.hash_buf.iter().enumerate() {
                let cell = &mut table[i * width + (h & self.width_mask) as usize];
                *cell += 1;
                updated = updated.min(*cell);
            }
        }

        // Re-read the untouched side for the ratio.
        let other = if label {
            &self.counts_neg
        } else {
            &self.counts_pos
        };
        let mut opposite = u32::MAX;
        for (i, &h) in self.hash_buf.iter().enumerate() {
            opposite = opposite.min(other[i * width + (h & self.width_mask) as usize]);
        }

        let (num, den) = if label {
            (updated, opposite)
        } else {
            (opposite, updated)
        };
        let ratio = (num as f32 + self.smooth) / (den as f32 + self.smooth);
        ratio / self.prior_ratio()
    }
}
