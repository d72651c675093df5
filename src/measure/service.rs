//! Sampler abstraction layer.
//!
//! The combiner only sees this trait, so tests can substitute canned samples
//! for real network round trips.

use super::sampler::HttpSampler;
use super::types::{Role, TimingSample};
use std::future::Future;
use std::pin::Pin;

pub type SampleFuture<'a> = Pin<Box<dyn Future<Output = TimingSample> + Send + 'a>>;

/// Produces one timing sample per call.
///
/// Implementations must absorb failures into a placeholder sample rather
/// than surfacing them.
pub trait MeasurementSampler: Send + Sync {
    fn measure<'a>(&'a self, target: Option<&'a str>, role: Role) -> SampleFuture<'a>;
}

impl MeasurementSampler for HttpSampler {
    fn measure<'a>(&'a self, target: Option<&'a str>, role: Role) -> SampleFuture<'a> {
        Box::pin(self.sample(target, role))
    }
}
