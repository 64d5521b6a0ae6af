use crate::observability::HealthStatus;
use crate::AppContext;
use axum::{extract::State, Json};
use std::sync::Arc;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<HealthStatus> {
    let uptime = ctx.started_at.elapsed().as_secs();
    let db_ok = ctx.storage.ping().await;
    Json(HealthStatus::ok(uptime, db_ok))
}
