use axum::routing::get;
use axum::Router;
use tracing::{error, info};

/// Start metrics HTTP server
pub async fn serve_metrics(port: u16) {
    let app = Router::new().route(
        "/metrics",
        get(|| async { sandwich_core::telemetry::gather_metrics() }),
    );

    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("❌ Failed to bind metrics port {}: {}", port, e);
            return;
        }
    };
    info!("📊 Prometheus metrics server starting on 0.0.0.0:{}", port);
    if let Err(e) = axum::serve(listener, app).await {
        error!("❌ Metrics server stopped: {}", e);
    }
}
