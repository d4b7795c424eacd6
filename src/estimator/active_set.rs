use crate::error::{Error, Result};
use crate::heap::MagnitudeHeap;
use crate::logistic::scale_shrink;
use crate::math::logistic_grad;
use crate::sketch::CountSketch;

use super::{sort_by_magnitude, EstimatorConfig};

/// Active-set hybrid: exact weights for the current top-k, a Count-Sketch
/// for everything else.
///
/// The heap is the active set. A feature lives in exactly one of the two
/// structures at a time (modulo sketch aliasing): heap members are read and
/// written exactly; everyone else is read from and written to the sketch.
/// Each update applies one consistent gradient step across both, then
/// reconciles membership:
///
/// - a sketch feature whose updated weight beats the heap minimum is
///   *promoted* — its stale sketch residual is left in place, since heap
///   reads supersede it while it remains a member;
/// - the displaced member is *demoted* — the sketch receives
///   `popped_w − sk.get(popped_k)` so that subsequent sketch reads return
///   its parting exact weight;
/// - a sketch feature that fails to get in keeps its weight in the sketch:
///   only the step's delta `−u·x_i` is written.
///
/// Sketch-write aliasing is the expected error source and the price of
/// sublinear memory; none of these writes can fail.
pub struct ActiveSetTopK {
    heap: MagnitudeHeap<u32>,
    sk: CountSketch,
    bias: f32,
    lr_init: f32,
    l2_reg: f32,
    scale: f32,
    t: u64,
    /// `(key, x_i, weight)` for the active example, split by membership.
    heap_feats: Vec<(u32, f32, f32)>,
    sk_feats: Vec<(u32, f32, f32)>,
}

impl ActiveSetTopK {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self> {
        if cfg.lr_init <= 0.0 {
            return Err(Error::InvalidLearningRate(cfg.lr_init));
        }
        Ok(ActiveSetTopK {
            heap: MagnitudeHeap::new(cfg.k),
            sk: CountSketch::new(cfg.log2_width, cfg.depth, cfg.seed)?,
            bias: 0.0,
            lr_init: cfg.lr_init,
            l2_reg: cfg.l2_reg,
            scale: 1.0,
            t: 0,
            heap_feats: Vec::new(),
            sk_feats: Vec::new(),
        })
    }

    /// Partitioned forward pass. Fills the membership buffers for the
    /// backward pass.
    fn dot(&mut self, x: &[(u32, f32)]) -> f32 {
        self.heap_feats.clear();
        self.sk_feats.clear();
        if x.is_empty() {
            return 0.0;
        }

        let mut z = 0.0;
        for &(key, val) in x {
            let w = if self.heap.contains(&key) {
                let w = self.heap.get(&key);
                self.heap_feats.push((key, val, w));
                w
            } else {
                let w = self.sk.get(key);
                self.sk_feats.push((key, val, w));
                w
            };
            z += w * val;
        }
        z * self.scale
    }

    pub fn predict(&mut self, x: &[(u32, f32)]) -> bool {
        self.dot(x) + self.bias >= 0.0
    }

    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        if x.is_empty() {
            return self.bias >= 0.0;
        }
        let y = if label { 1.0 } else { -1.0 };
        let lr = self.lr_init / (1.0 + self.lr_init * self.l2_reg * self.t as f32);
        let z = self.dot(x) + self.bias;
        let yhat = z >= 0.0;
        let g = logistic_grad(y * z);
        self.scale *= scale_shrink(lr, self.l2_reg);
        let u = lr * y * g / self.scale;

        // Heap members: exact in-place update.
        for i in 0..self.heap_feats.len() {
            let (key, val, w) = self.heap_feats[i];
            self.heap.change_val(&key, w - u * val);
        }

        // Sketch members: compute updated weights locally first; nothing
        // is written back until membership is settled.
        for feat in &mut self.sk_feats {
            feat.2 -= u * feat.1;
        }

        // … then attempt promotion in descending magnitude order, so the
        // strongest candidates claim slots before weaker ones evict them.
        self.sk_feats
            .sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));

        for i in 0..self.sk_feats.len() {
            let (key, val, w) = self.sk_feats[i];
            let Some((popped_key, popped_w)) = self.heap.insert(key, w) else {
                // Promoted into a non-full heap; the stale sketch residual
                // stays, shadowed by the exact heap value.
                continue;
            };
            if key == popped_key {
                // Rejected: the weight stays sketched, so only this step's
                // delta is written.
                self.sk.update(key, -u * val);
            } else {
                // Demoted incumbent: make future sketch reads return its
                // parting exact weight.
                let residual = self.sk.get(popped_key);
                self.sk.update(popped_key, popped_w - residual);
            }
        }

        self.bias -= lr * y * g;
        self.t += 1;
        yhat
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

#[cfg(test)]
mod tests {
    use super::*;

    fn config(k: u32) -> EstimatorConfig {
        EstimatorConfig {
            k,
            log2_width: 10,
            depth: 5,
            seed: 3,
            lr_init: 0.5,
            l2_reg: 0.0,
            ..EstimatorConfig::default()
        }
    }

    #[test]
    fn learns_linearly_separable_pair() {
        let mut est = ActiveSetTopK::new(&config(4)).unwrap();
        for _ in 0..100 {
            est.update(&[(0, 1.0)], true);
            est.update(&[(1, 1.0)], false);
        }
        assert!(est.predict(&[(0, 1.0)]));
        assert!(!est.predict(&[(1, 1.0)]));
    }

    #[test]
    fn first_features_enter_the_heap() {
        let mut est = ActiveSetTopK::new(&config(4)).unwrap();
        est.update(&[(7, 1.0), (8, 1.0)], true);
        assert!(est.heap.contains(&7));
        assert!(est.heap.contains(&8));
    }

    #[test]
    fn demotion_writes_parting_weight_into_sketch() {
        let mut est = ActiveSetTopK::new(&config(1)).unwrap();
        est.update(&[(0, 0.1)], true);
        let w0 = est.heap.get(&0);
        assert!(w0 > 0.0);

        // A much stronger feature displaces key 0 from the only slot.
        est.update(&[(1, 10.0)], true);
        assert!(!est.heap.contains(&0));
        assert!(est.heap.contains(&1));

        // The demoted weight must now be readable from the sketch.
        assert!(
            (est.sk.get(0) - w0).abs() < 1e-5,
            "sketch read {} vs parting weight {w0}",
            est.sk.get(0)
        );
    }

    #[test]
    fn rejected_features_accumulate_in_the_sketch() {
        let mut est = ActiveSetTopK::new(&config(1)).unwrap();
        // Claim the slot with an overwhelming weight.
        est.update(&[(1, 100.0)], true);
        assert!(est.heap.contains(&1));

        // Key 0 keeps losing the promotion contest; its per-step deltas
        // must still accumulate in the sketch rather than vanish.
        for _ in 0..5 {
            est.update(&[(0, 0.01)], false);
        }
        assert!(!est.heap.contains(&0));
        assert!(est.sk.get(0) < 0.0, "sketch residual {}", est.sk.get(0));
    }

    #[test]
    fn top_k_reports_scaled_heap_contents() {
        let mut cfg = config(4);
        cfg.l2_reg = 1e-3;
        let mut est = ActiveSetTopK::new(&cfg).unwrap();
        for _ in 0..50 {
            est.update(&[(0, 1.0)], true);
        }
        let top = est.top_k();
        assert_eq!(top[0].0, 0);
        assert!((top[0].1 - est.scale * est.heap.get(&0)).abs() < 1e-6);
    }
}
