// rest/mod.rs — Public REST API server.
//
// Axum HTTP server bridging REST calls to the braindump pipeline.
// Local only by default; set `bind_address` to expose on the LAN.
//
// Endpoints:
//   GET  /api/v1/health
//   POST /api/v1/braindumps/analyze
//   POST /api/v1/braindumps
//   GET  /api/v1/braindumps
//   GET  /api/v1/braindumps/{id}
//   POST /api/v1/braindumps/{id}/score

pub mod routes;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        // Braindumps
        .route(
            "/api/v1/braindumps",
            get(routes::braindumps::list_braindumps).post(routes::braindumps::finalize_braindump),
        )
        .route(
            "/api/v1/braindumps/analyze",
            post(routes::braindumps::analyze_braindump),
        )
        .route(
            "/api/v1/braindumps/{id}",
            get(routes::braindumps::get_braindump),
        )
        .route(
            "/api/v1/braindumps/{id}/score",
            post(routes::braindumps::score_braindump),
        )
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
