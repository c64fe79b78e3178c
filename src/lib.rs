//! Vehicle failure-risk prediction.
//!
//! Five telemetry readings go through a mean imputer, a standard scaler and a
//! class-weighted random forest to yield a `low` / `medium` / `high` risk
//! estimate with a confidence score. Hyperparameters are chosen by
//! stratified cross-validated grid search; fitted pipelines and their label
//! tables persist as independent artifacts and are served over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod ml;
pub mod models;
pub mod synthetic;

pub use error::{AppError, Result};
