use anyhow::{Context, Result};
use axum::http::HeaderValue;
use config::Value;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

pub const SERVICE_NAME: &str = "inference-gateway";

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub service_name: String,
    pub log_level: String,
    pub server: ServerConfig,
    pub artifacts: ArtifactPaths,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

/// Locations of the three model artifacts.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactPaths {
    pub model_path: PathBuf,
    pub label_encoder_path: PathBuf,
    pub feature_order_path: PathBuf,
    /// Hex SHA-256 the model file must match, when set.
    #[serde(default)]
    pub model_sha256: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl CorsConfig {
    /// Methods and headers mirror the preflight request. A `*` origin disables credentials.
    pub fn layer(&self) -> Result<CorsLayer> {
        let base = CorsLayer::new()
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request());
        if self.allow_origins.iter().any(|o| o == "*") {
            if self.allow_credentials {
                tracing::warn!("wildcard CORS origin configured; credentials disabled");
            }
            return Ok(base.allow_origin(AllowOrigin::any()));
        }
        let origins = self.allow_origins.iter()
            .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {o:?}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(base.allow_origin(AllowOrigin::list(origins)).allow_credentials(self.allow_credentials))
    }
}

pub fn load() -> Result<GatewayConfig> {
    let defaults = [
        ("log_level", Value::from("info")),
        ("server.host", Value::from("0.0.0.0")),
        ("server.port", Value::from(8000i64)),
        ("artifacts.model_path", Value::from("models/agrosmart_rf_crop_model.json")),
        ("artifacts.label_encoder_path", Value::from("models/agrosmart_label_encoder.json")),
        ("artifacts.feature_order_path", Value::from("models/agrosmart_feature_order.json")),
        ("cors.allow_origins", Value::from(vec!["http://localhost:5173"])),
        ("cors.allow_credentials", Value::from(true)),
    ];
    let cfg = agrosmart_core::layered_config(SERVICE_NAME, &defaults, &["cors.allow_origins"])?;
    Ok(cfg.try_deserialize()?)
}
