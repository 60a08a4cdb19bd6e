//! The prediction flow: validate, assemble, infer, decode, respond.

use serde::Serialize;
use std::collections::BTreeMap;
use crate::error::PredictError;
use crate::features::{validate, FeatureVector, FieldError};
use crate::registry::ModelRegistry;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub predicted_crop: String,
    pub confidence: f64,
    pub probabilities: BTreeMap<String, f64>,
}

#[derive(Debug)]
pub enum PredictOutcome {
    Success(PredictionResult),
    ValidationFailure(Vec<FieldError>),
}

/// Runs one request body through the registry.
///
/// Validation failures never reach the classifier. `Err` is reserved for artifact
/// inconsistencies detected at request time.
pub fn predict(registry: &ModelRegistry, body: &[u8]) -> Result<PredictOutcome, PredictError> {
    let features = match validate(body) {
        Ok(f) => f,
        Err(errors) => return Ok(PredictOutcome::ValidationFailure(errors)),
    };
    let vector = FeatureVector::assemble(&features, registry.feature_order())?;
    let (id, proba) = registry.predict_category(&vector)?;
    let predicted_crop = registry.decode_label(id)?.to_string();
    let probabilities = proba.iter().enumerate()
        .map(|(i, p)| registry.decode_label(i).map(|label| (label.to_string(), *p)))
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    let confidence = proba.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(PredictOutcome::Success(PredictionResult { predicted_crop, confidence, probabilities }))
}
