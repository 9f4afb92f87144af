//! Health and metrics endpoints

use prometheus::{Encoder, Registry};
use std::{convert::Infallible, sync::Arc};
use warp::{http::StatusCode, Filter, Rejection, Reply};

pub async fn run_api_server(port: u16, metrics_registry: Registry) {
    tracing::info!("API server listening on port {}", port);

    warp::serve(routes(Arc::new(metrics_registry)))
        .run(([0, 0, 0, 0], port))
        .await;
}

pub fn routes(
    registry: Arc<Registry>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let metrics = warp::path("metrics")
        .and(warp::get())
        .and(with_metrics(registry))
        .and_then(get_metrics);

    health.or(metrics)
}

fn with_metrics(
    registry: Arc<Registry>,
) -> impl Filter<Extract = (Arc<Registry>,), Error = Infallible> + Clone {
    warp::any().map(move || registry.clone())
}

async fn get_metrics(registry: Arc<Registry>) -> Result<Box<dyn Reply>, Rejection> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "failed to encode metrics");
        return Ok(Box::new(StatusCode::INTERNAL_SERVER_ERROR));
    }
    Ok(Box::new(warp::reply::with_header(
        buffer,
        "Content-Type",
        encoder.format_type(),
    )))
}
