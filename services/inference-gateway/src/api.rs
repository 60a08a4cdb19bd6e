use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use crate::error::PredictError;
use crate::features::FieldError;
use crate::metrics::{self, PREDICTED_LABELS, PREDICT_LATENCY};
use crate::predict::{self, PredictOutcome, PredictionResult};
use crate::registry::ModelRegistry;

pub const ROOT_MESSAGE: &str = "AgroSmart ML API running";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
}

/// Service routes plus the shared `/ready` and `/metrics` routes. CORS and tracing layers are added by the caller.
pub fn router(registry: Arc<ModelRegistry>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict", post(predict_handler))
        .with_state(AppState { registry })
        .merge(agrosmart_core::health_routes())
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "message": ROOT_MESSAGE}))
}

#[instrument(skip_all, fields(body_len = body.len()))]
async fn predict_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<PredictionResult>, ApiError> {
    let _timer = PREDICT_LATENCY.start_timer();
    match predict::predict(&state.registry, &body) {
        Ok(PredictOutcome::Success(result)) => {
            metrics::record_outcome(metrics::OUTCOME_SUCCESS);
            PREDICTED_LABELS.with_label_values(&[result.predicted_crop.as_str()]).inc();
            debug!(crop = %result.predicted_crop, confidence = result.confidence, "prediction");
            Ok(Json(result))
        }
        Ok(PredictOutcome::ValidationFailure(errors)) => {
            metrics::record_outcome(metrics::OUTCOME_VALIDATION_FAILED);
            debug!(errors = errors.len(), "request rejected");
            Err(ApiError::Validation(errors))
        }
        Err(e) => {
            metrics::record_outcome(metrics::failure_outcome(&e));
            error!(error = %e, "prediction failed");
            Err(ApiError::Predict(e))
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<FieldError>),
    Predict(PredictError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(detail) => (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "detail": detail }))).into_response(),
            ApiError::Predict(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": e.to_string() }))).into_response(),
        }
    }
}
