use crate::error::{Error, Result};
use crate::heap::{MagnitudeHeap, WeightedReservoir};
use crate::logistic::scale_shrink;
use crate::math::logistic_grad;

use super::{sort_by_magnitude, EstimatorConfig};

/// Hard-truncated logistic baseline: the heap *is* the model.
///
/// Features outside the heap contribute zero to the forward pass and start
/// from zero when their gradient step wins a slot back. Simple, and the
/// canonical failure mode the sketched estimators exist to fix — a feature
/// evicted early loses its accumulated weight.
pub struct TruncatedTopK {
    heap: MagnitudeHeap<u32>,
    bias: f32,
    lr_init: f32,
    l2_reg: f32,
    scale: f32,
    t: u64,
}

impl TruncatedTopK {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self> {
        if cfg.lr_init <= 0.0 {
            return Err(Error::InvalidLearningRate(cfg.lr_init));
        }
        Ok(TruncatedTopK {
            heap: MagnitudeHeap::new(cfg.k),
            bias: 0.0,
            lr_init: cfg.lr_init,
            l2_reg: cfg.l2_reg,
            scale: 1.0,
            t: 0,
        })
    }

    fn weight(&self, key: u32) -> f32 {
        if self.heap.contains(&key) {
            self.heap.get(&key)
        } else {
            0.0
        }
    }

    fn dot(&self, x: &[(u32, f32)]) -> f32 {
        let mut z = 0.0;
        for &(key, val) in x {
            z += self.weight(key) * val;
        }
        z * self.scale
    }

    pub fn predict(&mut self, x: &[(u32, f32)]) -> bool {
        self.dot(x) + self.bias >= 0.0
    }

    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        let y = if label { 1.0 } else { -1.0 };
        let lr = self.lr_init / (1.0 + self.lr_init * self.l2_reg * self.t as f32);
        let z = self.dot(x) + self.bias;
        self.scale *= scale_shrink(lr, self.l2_reg);
        let g = logistic_grad(y * z);
        for &(key, val) in x {
            let new_w = self.weight(key) - lr * y * g * val / self.scale;
            self.heap.insert_or_change(key, new_w);
        }

        self.bias -= lr * y * g;
        self.t += 1;
        z >= 0.0
    }

    pub fn top_k(&mut self) -> Vec<(u32, f32)> {
        let mut out = self.heap.items();
        for item in &mut out {
            item.1 *= self.scale;
        }
        sort_by_magnitude(&mut out);
        out
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }
}

/// Probabilistically-truncated variant: membership is decided by an A-Res
/// weighted reservoir instead of a hard magnitude cut, so low-weight
/// features keep a nonzero chance of being retained. The `pow` exponent
/// sharpens (`> 1`) or flattens (`< 1`) the retention bias.
pub struct ProbTruncatedTopK {
    res: WeightedReservoir,
    bias: f32,
    lr_init: f32,
    l2_reg: f32,
    scale: f32,
    t: u64,
}

impl ProbTruncatedTopK {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self> {
        if cfg.lr_init <= 0.0 {
            return Err(Error::InvalidLearningRate(cfg.lr_init));
        }
        Ok(ProbTruncatedTopK {
            res: WeightedReservoir::new(cfg.k, cfg.seed, cfg.pow),
            bias: 0.0,
            lr_init: cfg.lr_init,
            l2_reg: cfg.l2_reg,
            scale: 1.0,
            t: 0,
        })
    }

    fn weight(&self, key: u32) -> f32 {
        if self.res.contains(key) {
            self.res.get(key)
        } else {
            0.0
        }
    }

    fn dot(&self, x: &[(u32, f32)]) -> f32 {
        let mut z = 0.0;
        for &(key, val) in x {
            z += self.weight(key) * val;
        }
        z * self.scale
    }

    pub fn predict(&mut self, x: &[(u32, f32)]) -> bool {
        self.dot(x) + self.bias >= 0.0
    }

    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        let y = if label { 1.0 } else { -1.0 };
        let lr = self.lr_init / (1.0 + self.lr_init * self.l2_reg * self.t as f32);
        let z = self.dot(x) + self.bias;
        self.scale *= scale_shrink(lr, self.l2_reg);
        let g = logistic_grad(y * z);
        for &(key, val) in x {
            let new_w = self.weight(key) - lr * y * g * val / self.scale;
            self.res.insert_or_change(key, new_w);
        }

        self.bias -= lr * y * g;
        self.t += 1;
        z >= 0.0
    }

    pub fn top_k(&mut self) -> Vec<(u32, f32)> {
        let mut out = self.res.items();
        for item in &mut out {
            item.1 *= self.scale;
        }
        sort_by_magnitude(&mut out);
        out
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }
}
