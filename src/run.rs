//! Training and evaluation drivers shared by the CLI and the test suite.

use std::time::Instant;

use tracing::info;

use crate::dataset::SparseDataset;
use crate::estimator::Estimator;

/// How to traverse the training set.
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// Linear passes over the dataset (ignored when sampling).
    pub epochs: u32,
    /// Sampled steps; `0` with `sample` set means one dataset-size epoch.
    pub iters: u32,
    /// Seed for the example sampler.
    pub seed: u64,
    /// Sample examples with replacement instead of a linear pass.
    pub sample: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        TrainOptions {
            epochs: 1,
            iters: 0,
            seed: 1,
            sample: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrainStats {
    pub runtime_ms: u64,
    /// Online (progressive) prediction errors during training.
    pub err_count: u32,
    pub count: u32,
}

impl TrainStats {
    pub fn err_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.err_count as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TestStats {
    pub runtime_ms: u64,
    pub precision: f32,
    pub recall: f32,
}

impl TestStats {
    pub fn f1(&self) -> f32 {
        2.0 * self.precision * self.recall / (self.precision + self.recall)
    }
}

/// Trains `estimator` over `dataset`, counting progressive errors.
///
/// With `iters == 0` and sampling off, makes `epochs` linear passes in
/// presentation order. Otherwise reseeds the dataset sampler and takes
/// `iters` uniformly sampled steps.
pub fn train(
    estimator: &mut Estimator,
    dataset: &mut SparseDataset,
    opts: &TrainOptions,
) -> TrainStats {
    let start = Instant::now();
    let mut err_count = 0u32;
    let mut count = 0u32;

    let mut iters = opts.iters;
    if opts.sample && iters == 0 {
        iters = dataset.num_examples();
    }

    if iters == 0 {
        for _ in 0..opts.epochs {
            for ex in &dataset.examples {
                let y = ex.label == 1;
                if estimator.update(&ex.features, y) != y {
                    err_count += 1;
                }
                count += 1;
            }
        }
    } else {
        dataset.seed(opts.seed);
        for _ in 0..iters {
            let ex = dataset.sample();
            let y = ex.label == 1;
            let features = &ex.features;
            if estimator.update(features, y) != y {
                err_count += 1;
            }
            count += 1;
        }
    }

    let runtime_ms = start.elapsed().as_millis() as u64;
    info!(runtime_ms, err_count, count, "training pass complete");
    TrainStats {
        runtime_ms,
        err_count,
        count,
    }
}

/// Scores `estimator` on `dataset`; precision and recall default to 1.0
/// when their denominators are empty.
pub fn evaluate(estimator: &mut Estimator, dataset: &SparseDataset) -> TestStats {
    let start = Instant::now();
    let mut tp = 0u32;
    let mut fp = 0u32;
    let mut fne = 0u32;

    for ex in &dataset.examples {
        let y = ex.label == 1;
        let yhat = estimator.predict(&ex.features);
        if y && yhat {
            tp += 1;
        }
        if !y && yhat {
            fp += 1;
        }
        if y && !yhat {
            fne += 1;
        }
    }

    let precision = if tp + fp == 0 {
        1.0
    } else {
        tp as f32 / (tp + fp) as f32
    };
    let recall = if tp + fne == 0 {
        1.0
    } else {
        tp as f32 / (tp + fne) as f32
    };

    let runtime_ms = start.elapsed().as_millis() as u64;
    info!(runtime_ms, precision, recall, "evaluation complete");
    TestStats {
        runtime_ms,
        precision,
        recall,
    }
}
