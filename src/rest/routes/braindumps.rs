// rest/routes/braindumps.rs — Braindump REST routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::braindump::{self, AnalysisResult, FinalizeError, IncomingTask};
use crate::observability::LatencyTracker;
use crate::scoring;
use crate::AppContext;

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub content: String,
}

/// Analyze raw braindump text without persisting anything.
pub async fn analyze_braindump(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, (StatusCode, Json<Value>)> {
    let tracker = LatencyTracker::start("braindump.analyze");
    let result = braindump::analyze(&body.content, &ctx.gemini, &ctx.config.analysis).await;
    tracker.finish();

    match result {
        Ok(analysis) => Ok(Json(analysis)),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

#[derive(Deserialize)]
pub struct FinalizeRequest {
    pub raw_text: String,
    #[serde(default)]
    pub tasks: Vec<IncomingTask>,
}

/// Persist reviewed tasks, then score the new braindump.
///
/// Scoring failure is non-fatal: the braindump is already saved, so the
/// response carries `"scoring": null` instead of an error.
pub async fn finalize_braindump(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<FinalizeRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let tracker = LatencyTracker::start("braindump.finalize");
    let outcome = braindump::finalize(&ctx.storage, &body.raw_text, &body.tasks).await;

    let response = match outcome {
        Ok(outcome) => {
            let scoring = match scoring::score_braindump(&ctx.storage, &outcome.braindump_id).await
            {
                Ok(result) => serde_json::to_value(result).unwrap_or(Value::Null),
                Err(e) => {
                    warn!(braindump_id = %outcome.braindump_id, error = %e, "scoring after finalize failed");
                    Value::Null
                }
            };
            Ok(Json(json!({
                "braindump_id": outcome.braindump_id,
                "tasks_saved": outcome.tasks_saved,
                "scoring": scoring,
            })))
        }
        Err(e @ (FinalizeError::MissingRawText | FinalizeError::NoTasksToSave)) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    };
    tracker.finish();
    response
}

/// Re-run scoring for an existing braindump.
pub async fn score_braindump(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<scoring::ScoreResult>, (StatusCode, Json<Value>)> {
    match ctx.storage.get_braindump(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Braindump not found" })),
            ))
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }

    let tracker = LatencyTracker::start("braindump.score");
    let result = scoring::score_braindump(&ctx.storage, &id).await;
    tracker.finish();

    match result {
        Ok(score) => Ok(Json(score)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

pub async fn list_braindumps(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    match ctx.storage.list_braindumps(limit).await {
        Ok(rows) => {
            let list: Vec<Value> = rows
                .iter()
                .map(|b| {
                    json!({
                        "id": b.id,
                        "raw_text": b.raw_text,
                        "task_count": b.task_count,
                        "metadata": parse_metadata(&b.metadata),
                        "created_at": b.created_at,
                    })
                })
                .collect();
            Ok(Json(json!({ "braindumps": list })))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

pub async fn get_braindump(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let braindump = match ctx.storage.get_braindump(&id).await {
        Ok(Some(b)) => b,
        Ok(None) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Braindump not found" })),
            ))
        }
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    };

    match ctx.storage.tasks_for_braindump(&id).await {
        Ok(tasks) => Ok(Json(json!({
            "id": braindump.id,
            "raw_text": braindump.raw_text,
            "task_count": braindump.task_count,
            "metadata": parse_metadata(&braindump.metadata),
            "created_at": braindump.created_at,
            "tasks": tasks,
        }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

// Metadata is stored as a JSON string; surface it as an object.
fn parse_metadata(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| json!({}))
}
