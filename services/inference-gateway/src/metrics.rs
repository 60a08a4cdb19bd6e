//! Prediction metrics, exposed through the shared `/metrics` route.

use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter_vec, Histogram, IntCounterVec};
use crate::error::PredictError;

pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_VALIDATION_FAILED: &str = "validation_failed";
pub const OUTCOME_LOOKUP_FAILED: &str = "lookup_failed";
pub const OUTCOME_INFERENCE_FAILED: &str = "inference_failed";

pub static PREDICT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("agrosmart_predict_requests_total", "Prediction requests by outcome", &["outcome"])
        .expect("register agrosmart_predict_requests_total")
});

pub static PREDICT_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!("agrosmart_predict_latency_seconds", "Validation through response assembly",
        vec![0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1])
        .expect("register agrosmart_predict_latency_seconds")
});

pub static PREDICTED_LABELS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("agrosmart_predicted_label_total", "Predictions per returned label", &["label"])
        .expect("register agrosmart_predicted_label_total")
});

pub fn record_outcome(outcome: &str) {
    PREDICT_REQUESTS.with_label_values(&[outcome]).inc();
}

/// Outcome label for a request that passed validation but could not be answered.
pub fn failure_outcome(err: &PredictError) -> &'static str {
    match err {
        PredictError::Lookup(_) => OUTCOME_LOOKUP_FAILED,
        PredictError::Classifier(_) | PredictError::UnknownFeature(_) => OUTCOME_INFERENCE_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClassifierError, LookupError};

    #[test]
    fn only_table_misses_count_as_lookup_failures() {
        assert_eq!(failure_outcome(&LookupError(9).into()), OUTCOME_LOOKUP_FAILED);
        assert_eq!(failure_outcome(&ClassifierError::Runtime("tract".into()).into()), OUTCOME_INFERENCE_FAILED);
        assert_eq!(failure_outcome(&ClassifierError::EmptyDistribution.into()), OUTCOME_INFERENCE_FAILED);
        assert_eq!(failure_outcome(&ClassifierError::Arity { expected: 7, actual: 6 }.into()), OUTCOME_INFERENCE_FAILED);
        assert_eq!(failure_outcome(&PredictError::UnknownFeature("soil".into())), OUTCOME_INFERENCE_FAILED);
    }
}
