//! AgroSmart crop inference gateway.
//!
//! Loads a trained crop classifier with its label table and feature order once at
//! startup and serves predictions over HTTP.

pub mod api;
pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod metrics;
pub mod predict;
pub mod registry;

pub use api::router;
pub use classifier::{Classifier, ForestClassifier};
pub use error::{ClassifierError, LookupError, PredictError, StartupError};
pub use registry::{CategoryId, ModelRegistry};
