//! Braindump capture pipeline.
//!
//! A braindump is one multi-line paste of unstructured tasks. Analysis runs
//! parse → model call → reconcile, degrading to pure heuristics whenever the
//! model path is unavailable; callers never see model failures. Finalize
//! turns the reviewed suggestions into durable rows.

use thiserror::Error;
use tracing::{debug, warn};

pub mod dedup;
pub mod heuristics;
pub mod lines;
pub mod reconcile;
pub mod types;

use crate::config::AnalysisConfig;
use crate::gemini::GeminiClient;
use crate::storage::{NewTask, Storage};
use types::TaskAction;

pub use types::AnalysisResult;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("braindump has {count} lines, limit is {max}")]
    TooManyLines { count: usize, max: usize },
}

/// Analyze raw braindump text into categorized task suggestions.
///
/// Empty or whitespace-only content yields a zeroed result rather than an
/// error. Oversized input is the one hard failure at this boundary.
pub async fn analyze(
    content: &str,
    gemini: &GeminiClient,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalyzeError> {
    let lines = lines::parse_lines(content);
    if lines.is_empty() {
        debug!("empty braindump content, returning zeroed analysis");
        return Ok(AnalysisResult::empty());
    }
    if lines.len() > config.max_lines {
        return Err(AnalyzeError::TooManyLines {
            count: lines.len(),
            max: config.max_lines,
        });
    }

    match gemini.analyze(&lines).await {
        Ok(model) => Ok(reconcile::reconcile(&lines, model, config)),
        Err(err) => {
            warn!(error = %err, "model analysis unavailable, falling back to heuristics");
            Ok(heuristics::fallback_analysis(&lines, config))
        }
    }
}

/// A reviewed task as submitted for finalization. The client may have edited
/// category and priority; `action` decides whether the row is committed.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct IncomingTask {
    pub line: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    pub action: TaskAction,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FinalizeOutcome {
    pub braindump_id: String,
    pub tasks_saved: usize,
}

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("missing raw text")]
    MissingRawText,
    #[error("no tasks to save")]
    NoTasksToSave,
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

/// Persist the kept and merged tasks of a reviewed braindump.
///
/// Longevity is counted against history before the insert so recurring
/// tasks score higher later. Rows land in a single transaction together
/// with the braindump record.
pub async fn finalize(
    storage: &Storage,
    raw_text: &str,
    tasks: &[IncomingTask],
) -> Result<FinalizeOutcome, FinalizeError> {
    if raw_text.trim().is_empty() {
        return Err(FinalizeError::MissingRawText);
    }
    let committed: Vec<&IncomingTask> = tasks.iter().filter(|t| t.action.is_committed()).collect();
    if committed.is_empty() {
        return Err(FinalizeError::NoTasksToSave);
    }

    let mut rows = Vec::with_capacity(committed.len());
    for (position, task) in committed.iter().enumerate() {
        let normalized = lines::normalize_line(&task.line);
        let longevity = storage.longevity_count(&normalized).await?;
        let priority = task.priority.map(|p| p.clamp(1, 5));
        rows.push(NewTask {
            position: position as i64,
            content: task.line.clone(),
            normalized,
            category: task.category.clone(),
            priority,
            priority_group: priority_group(priority),
            action: task.action.as_str().to_string(),
            quick_win: lines::word_count(&task.line) <= heuristics::QUICK_WIN_MAX_WORDS,
            longevity,
        });
    }

    let braindump_id = storage.finalize_braindump(raw_text, &rows).await?;
    debug!(braindump_id = %braindump_id, tasks = rows.len(), "braindump finalized");
    Ok(FinalizeOutcome {
        braindump_id,
        tasks_saved: rows.len(),
    })
}

/// Map the 1–5 priority scale onto the four coarse buckets
/// (1 = Must .. 4 = Want). Unset priority stays unset.
fn priority_group(priority: Option<i64>) -> Option<i64> {
    priority.map(|p| match p {
        5 => 1,
        4 => 2,
        3 => 3,
        _ => 4,
    })
}
