use crate::error::Result;
use crate::heap::MagnitudeHeap;
use crate::wm::WeightMedianSketch;

use super::{sort_by_magnitude, EstimatorConfig};

/// Weight-Median Sketch estimator: forward passes and gradients run
/// against the sketch; the heap tracks candidates in stored scale and is
/// refreshed from fresh sketch reads before every `top_k`.
pub struct SketchTopK {
    sk: WeightMedianSketch,
    heap: MagnitudeHeap<u32>,
    new_weights: Vec<f32>,
    refresh_keys: Vec<u32>,
}

impl SketchTopK {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self> {
        Ok(SketchTopK {
            sk: WeightMedianSketch::new(
                cfg.log2_width,
                cfg.depth,
                cfg.seed,
                cfg.lr_init,
                cfg.l2_reg,
                cfg.median_update,
            )?,
            heap: MagnitudeHeap::new(cfg.k),
            new_weights: Vec::new(),
            refresh_keys: Vec::new(),
        })
    }

    pub fn predict(&mut self, x: &[(u32, f32)]) -> bool {
        self.sk.predict(x)
    }

    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        let yhat = self
            .sk
            .update_with_weights(&mut self.new_weights, x, label);
        for (&(key, _), &w) in x.iter().zip(&self.new_weights) {
            self.heap.insert_or_change(key, w);
        }
        yhat
    }

    pub fn top_k(&mut self) -> Vec<(u32, f32)> {
        // Heap values drift from the table as colliding keys keep
        // training; re-read every member before ranking.
        self.refresh_keys.clear();
        self.refresh_keys.extend(self.heap.keys());
        for &key in &self.refresh_keys {
            let w = self.sk.stored_weight(key);
            self.heap.change_val(&key, w);
        }

        let mut out = self.heap.items();
        let s = self.sk.scale();
        for item in &mut out {
            item.1 *= s;
        }
        sort_by_magnitude(&mut out);
        out
    }

    pub fn bias(&self) -> f32 {
        self.sk.bias()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EstimatorConfig {
        EstimatorConfig {
            k: 4,
            log2_width: 10,
            depth: 5,
            seed: 7,
            lr_init: 0.5,
            l2_reg: 0.0,
            ..EstimatorConfig::default()
        }
    }

    #[test]
    fn recovers_dominant_features() {
        let mut est = SketchTopK::new(&config()).unwrap();
        for _ in 0..100 {
            est.update(&[(10, 1.0)], true);
            est.update(&[(20, 1.0)], false);
        }
        let top = est.top_k();
        let keys: Vec<u32> = top.iter().map(|&(k, _)| k).collect();
        assert!(keys.contains(&10) && keys.contains(&20), "top = {top:?}");

        let w10 = top.iter().find(|&&(k, _)| k == 10).unwrap().1;
        let w20 = top.iter().find(|&&(k, _)| k == 20).unwrap().1;
        assert!(w10 > 0.0 && w20 < 0.0);
    }

    #[test]
    fn top_k_is_sorted_by_magnitude() {
        let mut est = SketchTopK::new(&config()).unwrap();
        for i in 0..50u32 {
            est.update(&[(i % 8, 1.0)], i % 2 == 0);
        }
        let top = est.top_k();
        for w in top.windows(2) {
            assert!(w[0].1.abs() >= w[1].1.abs());
        }
    }
}
