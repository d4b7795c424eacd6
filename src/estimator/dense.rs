use crate::error::Result;
use crate::heap::MagnitudeHeap;
use crate::logistic::LogisticRegression;

use super::{sort_by_magnitude, EstimatorConfig};

/// Exact baseline: a dense logistic model plus a magnitude heap fed with
/// the effective weights of every updated coordinate.
///
/// Memory is linear in the dimension; the heap exists only to answer
/// `top_k` without a full scan.
pub struct DenseTopK {
    lr: LogisticRegression,
    heap: MagnitudeHeap<u32>,
    new_weights: Vec<f32>,
}

impl DenseTopK {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self> {
        Ok(DenseTopK {
            lr: LogisticRegression::new(cfg.dim, cfg.lr_init, cfg.l2_reg, cfg.no_bias)?,
            heap: MagnitudeHeap::new(cfg.k),
            new_weights: Vec::new(),
        })
    }

    pub fn predict(&mut self, x: &[(u32, f32)]) -> bool {
        self.lr.predict(x)
    }

    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        let yhat = self.lr.update_with_weights(&mut self.new_weights, x, label);
        for (&(key, _), &w) in x.iter().zip(&self.new_weights) {
            self.heap.insert_or_change(key, w);
        }
        yhat
    }

    pub fn top_k(&mut self) -> Vec<(u32, f32)> {
        // Heap values are effective weights captured at update time; no
        // rescaling on emission.
        let mut out = self.heap.items();
        sort_by_magnitude(&mut out);
        out
    }

    pub fn bias(&self) -> f32 {
        self.lr.bias()
    }
}
