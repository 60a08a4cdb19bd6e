use anyhow::Result;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use agrosmart_core::{clear_ready, init_tracing, mark_ready};
use inference_gateway::{config, router, ModelRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::load()?;
    init_tracing(&cfg.service_name, &cfg.log_level)?;
    info!(?cfg, "config loaded");

    let registry = Arc::new(ModelRegistry::load(&cfg.artifacts)?);
    let app = router(registry)
        .layer(cfg.cors.layer()?)
        .layer(TraceLayer::new_for_http());

    let addr = cfg.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "inference-gateway listening");
    mark_ready();
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    clear_ready();
    info!("shutdown");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await { tracing::warn!(error=?e, "ctrl_c handler failed"); }
    };
    #[cfg(unix)]
    let term = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(e) => { tracing::warn!(error=?e, "SIGTERM handler failed"); std::future::pending::<()>().await; }
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
}
