pub mod combiner;
pub mod estimator;
pub mod metadata;
pub mod probe;
pub mod sampler;
pub mod service;
pub mod types;

pub use combiner::compare;
pub use estimator::{estimate, BreakdownEstimator, ProportionalEstimator, WarmConnectionEstimator};
pub use sampler::{HttpSampler, SamplerMode, SamplerSettings};
pub use service::MeasurementSampler;
pub use types::*;
