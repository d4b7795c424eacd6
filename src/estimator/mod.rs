//! The top-k feature estimator family.
//!
//! All strategies expose the same contract — `predict`, `update`, `top_k`,
//! `bias` — and differ in which weights the forward pass sees and how the
//! top-k structure is populated:
//!
//! | method | forward weights | top-k structure |
//! |---|---|---|
//! | `logistic` | dense exact | magnitude heap fed after each step |
//! | `logistic_sketch` | Weight-Median Sketch | heap refreshed from sketch reads |
//! | `activeset_logistic` | heap exact + sketch tail | promotion/demotion per update |
//! | `truncated_logistic` | heap members only | direct |
//! | `probtruncated_logistic` | reservoir members only | A-Res weighted reservoir |
//! | `countmin_logistic` | count-heap members only | count heap + Count-Min tail counts |
//! | `spacesaving_logistic` | count-heap members only | SpaceSaving replacement |
//!
//! plus the library-only [`PairedCountMinTopK`], which scores features by a
//! smoothed ratio of per-class counts instead of learned weights.
//!
//! The set is closed, so dispatch is a tagged enum rather than a trait
//! object.

mod active_set;
mod counted;
mod dense;
mod paired;
mod sketched;
mod truncated;

pub use active_set::ActiveSetTopK;
pub use counted::{CountMinTopK, SpaceSavingTopK};
pub use dense::DenseTopK;
pub use paired::PairedCountMinTopK;
pub use sketched::SketchTopK;
pub use truncated::{ProbTruncatedTopK, TruncatedTopK};

use clap::ValueEnum;
use serde::Serialize;

use crate::error::Result;

/// Sorts `(key, weight)` pairs by descending weight magnitude.
pub(crate) fn sort_by_magnitude<K>(items: &mut [(K, f32)]) {
    items.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
}

/// Estimation strategy selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[value(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Logistic,
    LogisticSketch,
    ActivesetLogistic,
    TruncatedLogistic,
    ProbtruncatedLogistic,
    CountminLogistic,
    SpacesavingLogistic,
}

/// Shared estimator configuration; unused fields are ignored by methods
/// that do not need them (e.g. `dim` only matters for `logistic`).
#[derive(Debug, Clone, Serialize)]
pub struct EstimatorConfig {
    /// Number of high-magnitude weights to track.
    pub k: u32,
    /// Feature dimension (dense baseline only).
    pub dim: u32,
    pub log2_width: u32,
    pub depth: u32,
    pub seed: u64,
    pub lr_init: f32,
    pub l2_reg: f32,
    /// Laplace smoothing for the counter-based baselines.
    pub count_smooth: f32,
    /// Exponent for probabilistic truncation.
    pub pow: f32,
    pub median_update: bool,
    pub consv_update: bool,
    pub no_bias: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            k: 512,
            dim: 0,
            log2_width: 10,
            depth: 1,
            seed: 1,
            lr_init: 0.1,
            l2_reg: 1e-6,
            count_smooth: 1.0,
            pow: 1.0,
            median_update: false,
            consv_update: false,
            no_bias: false,
        }
    }
}

/// A constructed estimator, dispatched by tag.
pub enum Estimator {
    Logistic(DenseTopK),
    LogisticSketch(SketchTopK),
    ActivesetLogistic(ActiveSetTopK),
    TruncatedLogistic(TruncatedTopK),
    ProbtruncatedLogistic(ProbTruncatedTopK),
    CountminLogistic(CountMinTopK),
    SpacesavingLogistic(SpaceSavingTopK),
    PairedCountmin(PairedCountMinTopK),
}

impl Estimator {
    /// Builds the estimator for `method` from `cfg`.
    pub fn new(method: Method, cfg: &EstimatorConfig) -> Result<Self> {
        Ok(match method {
            Method::Logistic => Estimator::Logistic(DenseTopK::new(cfg)?),
            Method::LogisticSketch => Estimator::LogisticSketch(SketchTopK::new(cfg)?),
            Method::ActivesetLogistic => Estimator::ActivesetLogistic(ActiveSetTopK::new(cfg)?),
            Method::TruncatedLogistic => Estimator::TruncatedLogistic(TruncatedTopK::new(cfg)?),
            Method::ProbtruncatedLogistic => {
                Estimator::ProbtruncatedLogistic(ProbTruncatedTopK::new(cfg)?)
            }
            Method::CountminLogistic => Estimator::CountminLogistic(CountMinTopK::new(cfg)?),
            Method::SpacesavingLogistic => {
                Estimator::SpacesavingLogistic(SpaceSavingTopK::new(cfg)?)
            }
        })
    }

    /// Builds the ratio-of-counts estimator, which has no CLI method name.
    pub fn paired_countmin(cfg: &EstimatorConfig) -> Result<Self> {
        Ok(Estimator::PairedCountmin(PairedCountMinTopK::new(cfg)?))
    }

    pub fn predict(&mut self, x: &[(u32, f32)]) -> bool {
        match self {
            Estimator::Logistic(e) => e.predict(x),
            Estimator::LogisticSketch(e) => e.predict(x),
            Estimator::ActivesetLogistic(e) => e.predict(x),
            Estimator::TruncatedLogistic(e) => e.predict(x),
            Estimator::ProbtruncatedLogistic(e) => e.predict(x),
            Estimator::CountminLogistic(e) => e.predict(x),
            Estimator::SpacesavingLogistic(e) => e.predict(x),
            Estimator::PairedCountmin(e) => e.predict(x),
        }
    }

    /// One online step. Returns the pre-update prediction.
    pub fn update(&mut self, x: &[(u32, f32)], label: bool) -> bool {
        match self {
            Estimator::Logistic(e) => e.update(x, label),
            Estimator::LogisticSketch(e) => e.update(x, label),
            Estimator::ActivesetLogistic(e) => e.update(x, label),
            Estimator::TruncatedLogistic(e) => e.update(x, label),
            Estimator::ProbtruncatedLogistic(e) => e.update(x, label),
            Estimator::CountminLogistic(e) => e.update(x, label),
            Estimator::SpacesavingLogistic(e) => e.update(x, label),
            Estimator::PairedCountmin(e) => e.update(x, label),
        }
    }

    /// Current top-k `(feature, effective weight)` pairs, sorted by
    /// descending magnitude.
    pub fn top_k(&mut self) -> Vec<(u32, f32)> {
        match self {
            Estimator::Logistic(e) => e.top_k(),
            Estimator::LogisticSketch(e) => e.top_k(),
            Estimator::ActivesetLogistic(e) => e.top_k(),
            Estimator::TruncatedLogistic(e) => e.top_k(),
            Estimator::ProbtruncatedLogistic(e) => e.top_k(),
            Estimator::CountminLogistic(e) => e.top_k(),
            Estimator::SpacesavingLogistic(e) => e.top_k(),
            Estimator::PairedCountmin(e) => e.top_k(),
        }
    }

    pub fn bias(&self) -> f32 {
        match self {
            Estimator::Logistic(e) => e.bias(),
            Estimator::LogisticSketch(e) => e.bias(),
            Estimator::ActivesetLogistic(e) => e.bias(),
            Estimator::TruncatedLogistic(e) => e.bias(),
            Estimator::ProbtruncatedLogistic(e) => e.bias(),
            Estimator::CountminLogistic(e) => e.bias(),
            Estimator::SpacesavingLogistic(e) => e.bias(),
            Estimator::PairedCountmin(e) => e.bias(),
        }
    }
}
