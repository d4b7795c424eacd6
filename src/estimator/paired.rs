use crate::error::Result;
use crate::heap::MagnitudeHeap;
use crate::sketch::PairedCountMin;

use super::{sort_by_magnitude, EstimatorConfig};

/// Ratio-of-counts estimator: features are scored by the log of their
/// smoothed per-class count ratio rather than by a learned weight.
///
/// No gradient anywhere — the "weight" of a feature is
/// `log( ((num+s)/(den+s)) / prior_ratio )`, a plug-in estimate of its
/// log-odds contribution. Prediction reduces to the class prior's sign;
/// per-feature evidence is not aggregated.
pub struct PairedCountMinTopK {
    sk: PairedCountMin,
    heap: MagnitudeHeap<u32>,
    new_weights: Vec<f32>,
    refresh_keys: Vec<u32>,
}

impl PairedCountMinTopK {
    pub fn new(cfg: &EstimatorConfig) -> Result<Self> {
        Ok(PairedCountMinTopK {
            sk: PairedCountMin::new(
                cfg.log2_width,
                cfg.depth,
                cfg.seed,
                cfg.count_smooth,
                cfg.consv_update,
            )?,
            heap: MagnitudeHeap::new(cfg.k),
            new_weights: Vec::new(),
            refresh_keys: Vec::new(),
        })
    }

    /// Sign of the class prior; feature counts are not consulted.
    pub fn predict(&mut self, _x: &[(u32, f32)]) -> bool {
        self.sk.prior_ratio() >= 1.0
    }

    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        let yhat = self.sk.update_with_weights(&mut self.new_weights, x, label);
        for (&(key, _), &ratio) in x.iter().zip(&self.new_weights) {
            self.heap.insert_or_change(key, ratio.ln());
        }
        yhat
    }

    pub fn top_k(&mut self) -> Vec<(u32, f32)> {
        // Ratios drift as the class totals move; re-read every member.
        self.refresh_keys.clear();
        self.refresh_keys.extend(self.heap.keys());
        for &key in &self.refresh_keys {
            let ratio = self.sk.get(key);
            self.heap.change_val(&key, ratio.ln());
        }

        let mut out = self.heap.items();
        sort_by_magnitude(&mut out);
        out
    }

    /// The smoothed class-prior ratio (not a log-odds bias term).
    pub fn bias(&self) -> f32 {
        self.sk.prior_ratio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EstimatorConfig {
        EstimatorConfig {
            k: 4,
            log2_width: 10,
            depth: 4,
            seed: 2,
            count_smooth: 1.0,
            ..EstimatorConfig::default()
        }
    }

    #[test]
    fn class_correlated_features_get_signed_log_ratios() {
        let mut est = PairedCountMinTopK::new(&config()).unwrap();
        for _ in 0..50 {
            est.update(&[(3, 1.0)], true);
            est.update(&[(9, 1.0)], false);
        }
        let top = est.top_k();
        let w3 = top.iter().find(|&&(k, _)| k == 3).unwrap().1;
        let w9 = top.iter().find(|&&(k, _)| k == 9).unwrap().1;
        assert!(w3 > 0.0, "positive-class feature log-ratio {w3}");
        assert!(w9 < 0.0, "negative-class feature log-ratio {w9}");
    }

    #[test]
    fn predict_follows_class_prior() {
        let mut est = PairedCountMinTopK::new(&config()).unwrap();
        for _ in 0..10 {
            est.update(&[(1, 1.0)], false);
        }
        assert!(!est.predict(&[(1, 1.0)]));
        for _ in 0..30 {
            est.update(&[(1, 1.0)], true);
        }
        assert!(est.predict(&[(1, 1.0)]));
    }
}
