pub mod config;
pub mod error;
pub mod infra;
pub mod measure;
pub mod routes;
pub mod shared;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use measure::{compare, ComparisonResult, HttpSampler, MeasurementSampler, Role, TimingSample};
pub use state::AppState;
