//! Core shared utilities for AgroSmart services.

use anyhow::Result;
use tracing::info;
use once_cell::sync::OnceCell;
use axum::{routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

pub mod settings;
pub use settings::{layered_config, ENV_PREFIX};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static NODE_READINESS: AtomicBool = AtomicBool::new(false);

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }
pub fn is_ready() -> bool { NODE_READINESS.load(Ordering::SeqCst) }

/// Installs the global subscriber once per process.
///
/// `RUST_LOG` wins over `default_level`. `AGROSMART_JSON_LOG=1` switches to flattened JSON events.
pub fn init_tracing(service: &str, default_level: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("AGROSMART_JSON_LOG").ok().map(|v| v=="1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .boxed()
        };
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(f) => f,
            Err(_) => EnvFilter::try_new(default_level)?,
        };
        tracing_subscriber::registry().with(fmt_layer).with(env_filter).try_init()?;
        Ok(())
    })?;
    info!(target: "agrosmart", service, "tracing initialized");
    Ok(())
}

/// Readiness and metrics routes shared by every service router.
pub fn health_routes() -> Router {
    Router::new()
        .route("/ready", get(|| async { axum::Json(serde_json::json!({"ready": is_ready()})) }))
        .route("/metrics", get(metrics_handler))
}

/// Prometheus text exposition of the default registry.
pub fn gather_metrics() -> Result<String> {
    let metric_families = prometheus::default_registry().gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

async fn metrics_handler() -> axum::response::Response {
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    match gather_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_toggles() {
        clear_ready();
        assert!(!is_ready());
        mark_ready();
        assert!(is_ready());
        clear_ready();
    }

    #[test]
    fn gather_includes_registered_counter() {
        let c = prometheus::register_int_counter!("agrosmart_core_test_total", "test counter").unwrap();
        c.inc();
        let body = gather_metrics().unwrap();
        assert!(body.contains("agrosmart_core_test_total 1"));
    }
}
