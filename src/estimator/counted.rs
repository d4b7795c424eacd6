use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};
use crate::heap::CountHeap;
use crate::logistic::scale_shrink;
use crate::math::logistic_grad;
use crate::sketch::CountMinSketch;

use super::{sort_by_magnitude, EstimatorConfig};

/// Frequency-gated logistic baseline: heap membership is decided by
/// occurrence counts, with a Count-Min sketch supplying count estimates
/// for features currently outside the heap.
///
/// Weights ride along as the heap's auxiliary values; a feature only
/// accumulates weight while it holds a slot.
pub struct CountMinTopK {
    cheap: CountHeap,
    sk: CountMinSketch,
    bias: f32,
    lr_init: f32,
    l2_reg: f32,
    scale: f32,
    t: u64,
}

impl CountMinTopK {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self> {
        if cfg.lr_init <= 0.0 {
            return Err(Error::InvalidLearningRate(cfg.lr_init));
        }
        Ok(CountMinTopK {
            cheap: CountHeap::new(cfg.k),
            sk: CountMinSketch::new(cfg.log2_width, cfg.depth, cfg.seed, cfg.consv_update)?,
            bias: 0.0,
            lr_init: cfg.lr_init,
            l2_reg: cfg.l2_reg,
            scale: 1.0,
            t: 0,
        })
    }

    fn weight(&self, key: u32) -> f32 {
        if self.cheap.contains(key) {
            self.cheap.get(key)
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

        // Count every occurrence: heap members in the heap, everyone in
        // the sketch (so a member's count survives a later demotion).
        for &(key, _) in x {
            if self.cheap.contains(key) {
                self.cheap.increment_count(key);
            }
            self.sk.update(key);
        }

        for &(key, val) in x {
            let new_w = self.weight(key) - lr * y * g * val / self.scale;
            let count = if self.cheap.contains(key) {
                self.cheap.count(key)
            } else {
                self.sk.get(key)
            };
            self.cheap.insert_or_change(key, count, new_w);
        }

        self.bias -= lr * y * g;
        self.t += 1;
        z >= 0.0
    }

    pub fn top_k(&mut self) -> Vec<(u32, f32)> {
        let mut out = self.cheap.items();
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

/// SpaceSaving-gated logistic baseline.
///
/// Heap members count occurrences exactly. When a full heap misses, one of
/// the example's missing features is chosen by reservoir sampling
/// (probability `1 / miss_index`) and replaces the minimum-count slot,
/// inheriting `min_count + 1` — the classic SpaceSaving overestimate.
pub struct SpaceSavingTopK {
    cheap: CountHeap,
    bias: f32,
    lr_init: f32,
    l2_reg: f32,
    scale: f32,
    t: u64,
    rng: StdRng,
}

impl SpaceSavingTopK {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self> {
        if cfg.lr_init <= 0.0 {
            return Err(Error::InvalidLearningRate(cfg.lr_init));
        }
        Ok(SpaceSavingTopK {
            cheap: CountHeap::new(cfg.k),
            bias: 0.0,
            lr_init: cfg.lr_init,
            l2_reg: cfg.l2_reg,
            scale: 1.0,
            t: 0,
            rng: StdRng::seed_from_u64(cfg.seed),
        })
    }

    fn weight(&self, key: u32) -> f32 {
        if self.cheap.contains(key) {
            self.cheap.get(key)
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

        // At most one miss per example wins the replacement slot.
        let mut replace = None;
        let mut misses = 0u32;
        for &(key, _) in x {
            if self.cheap.contains(key) {
                self.cheap.increment_count(key);
            } else if !self.cheap.is_full() {
                self.cheap.insert(key, 1, 0.0);
            } else {
                misses += 1;
                if self.rng.gen::<f64>() < 1.0 / misses as f64 {
                    replace = Some(key);
                }
            }
        }

        if let Some(key) = replace {
            let min_count = self.cheap.min_count();
            self.cheap.del_min();
            self.cheap.insert(key, min_count + 1, 0.0);
        }

        for &(key, val) in x {
            if self.cheap.contains(key) {
                let new_w = self.weight(key) - lr * y * g * val / self.scale;
                self.cheap.change_val(key, self.cheap.count(key), new_w);
            }
        }

        self.bias -= lr * y * g;
        self.t += 1;
        z >= 0.0
    }

    pub fn top_k(&mut self) -> Vec<(u32, f32)> {
        let mut out = self.cheap.items();
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

#[cfg(test)]
mod tests {
    use super::*;

    fn config(k: u32) -> EstimatorConfig {
        EstimatorConfig {
            k,
            log2_width: 8,
            depth: 4,
            seed: 5,
            lr_init: 0.5,
            l2_reg: 0.0,
            ..EstimatorConfig::default()
        }
    }

    #[test]
    fn countmin_learns_frequent_features() {
        let mut est = CountMinTopK::new(&config(4)).unwrap();
        for _ in 0..100 {
            est.update(&[(0, 1.0)], true);
            est.update(&[(1, 1.0)], false);
        }
        assert!(est.predict(&[(0, 1.0)]));
        assert!(!est.predict(&[(1, 1.0)]));
    }

    #[test]
    fn countmin_heap_holds_most_frequent() {
        let mut est = CountMinTopK::new(&config(2)).unwrap();
        // Features 0 and 1 are frequent; 2..10 appear once each.
        for i in 0..40 {
            est.update(&[(0, 1.0), (1, 1.0)], i % 2 == 0);
        }
        for k in 2..10u32 {
            est.update(&[(k, 1.0)], true);
        }
        assert!(est.cheap.contains(0));
        assert!(est.cheap.contains(1));
    }

    #[test]
    fn spacesaving_replacement_inherits_min_count() {
        let mut est = SpaceSavingTopK::new(&config(2)).unwrap();
        for _ in 0..5 {
            est.update(&[(0, 1.0)], true);
            est.update(&[(1, 1.0)], false);
        }
        let floor = est.cheap.min_count();
        // Heap is full; a new feature must displace a slot and inherit
        // min_count + 1.
        est.update(&[(2, 1.0)], true);
        assert!(est.cheap.contains(2));
        assert_eq!(est.cheap.count(2), floor + 1);
    }

    #[test]
    fn spacesaving_is_reproducible_per_seed() {
        let run = |seed: u64| {
            let mut cfg = config(3);
            cfg.seed = seed;
            let mut est = SpaceSavingTopK::new(&cfg).unwrap();
            for i in 0..100u32 {
                est.update(&[(i % 11, 1.0), (i % 7, 1.0)], i % 2 == 0);
            }
            let mut top = est.top_k();
            top.sort_by_key(|&(k, _)| k);
            top
        };
        assert_eq!(run(9), run(9));
    }
}
