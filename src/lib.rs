pub mod dataset;
pub mod error;
pub mod estimator;
pub mod hash;
pub mod heap;
pub mod logistic;
pub mod run;
pub mod sgns;
pub mod sketch;
pub mod wm;

mod math;

pub use error::{Error, Result};
pub use estimator::{Estimator, EstimatorConfig, Method};
pub use sgns::{SgnsConfig, StreamingSgns};
pub use wm::WeightMedianSketch;
