//! Deterministic task scoring.
//!
//! Runs over a braindump's committed tasks (`action` keep or merge) and
//! produces a sortable score per task:
//!
//! ```text
//! score = (priority_weight + longevity_factor)
//!         × quick_win_boost × urgency_component × shininess_penalty
//! ```
//!
//! Priority weight comes from the coarse 1–4 group (5.0 / 3.5 / 2.0 / 1.0,
//! unset → 2.0). Longevity is normalized against the set's maximum and
//! doubled, so a task the user keeps re-dumping climbs even in a low
//! priority group. Quick wins get a 1.25 boost. The optional user-supplied
//! urgency and shininess ranks sharpen or dampen the result; shininess is a
//! penalty against novelty-driven prioritization, floored at 0.5.
//!
//! Scoring is re-runnable: NONE → SCORED, and re-invocation simply
//! overwrites score and rank.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::storage::{ScoreUpdate, Storage, TaskRow};

/// One task with its computed score, in rank order.
#[derive(Debug, Clone, Serialize)]
pub struct RankedTask {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub category: Option<String>,
    pub priority_group: Option<i64>,
    pub longevity: i64,
    pub urgency_rank: Option<i64>,
    pub shininess_rank: Option<i64>,
    pub quick_win: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreResult {
    pub braindump_id: String,
    /// Ids of the three highest-scoring tasks.
    pub top3: Vec<String>,
    pub ranking: Vec<RankedTask>,
    pub summary: String,
}

/// Score a braindump's committed tasks and persist the outcome.
///
/// Writes `score` + 1-based `overall_rank` per task in one transaction and
/// merges `scoring_summary` / `top3` into the braindump metadata. A
/// braindump with no committed tasks yields an empty result and no writes.
pub async fn score_braindump(storage: &Storage, braindump_id: &str) -> Result<ScoreResult> {
    let tasks = storage.tasks_for_scoring(braindump_id).await?;
    if tasks.is_empty() {
        return Ok(ScoreResult {
            braindump_id: braindump_id.to_string(),
            top3: Vec::new(),
            ranking: Vec::new(),
            summary: "No tasks available for scoring.".to_string(),
        });
    }

    let ranking = compute_scores(&tasks);
    let top3: Vec<String> = ranking.iter().take(3).map(|t| t.id.clone()).collect();
    let summary = build_summary(&ranking);

    let updates: Vec<ScoreUpdate> = ranking
        .iter()
        .enumerate()
        .map(|(i, t)| ScoreUpdate {
            task_id: t.id.clone(),
            score: t.score,
            overall_rank: (i + 1) as i64,
        })
        .collect();
    storage.write_scores(&updates).await?;
    storage
        .merge_braindump_metadata(
            braindump_id,
            &serde_json::json!({ "scoring_summary": summary, "top3": top3 }),
        )
        .await?;

    info!(braindump_id = %braindump_id, tasks = ranking.len(), "braindump scored");
    Ok(ScoreResult {
        braindump_id: braindump_id.to_string(),
        top3,
        ranking,
        summary,
    })
}

/// Apply the formula to every task and sort descending by score.
///
/// The sort is stable, so equal scores keep input (position) order.
fn compute_scores(tasks: &[TaskRow]) -> Vec<RankedTask> {
    let max_longevity = tasks.iter().map(|t| t.longevity).max().unwrap_or(0).max(1);

    let mut ranking: Vec<RankedTask> = tasks
        .iter()
        .map(|t| {
            let priority_weight = priority_weight(t.priority_group);
            let longevity_factor = (t.longevity.max(0) as f64 / max_longevity as f64) * 2.0;
            let quick_win_boost = if t.quick_win { 1.25 } else { 1.0 };
            let urgency_component = match t.urgency_rank {
                Some(rank) if rank > 0 => 1.0 + 1.0 / rank as f64,
                _ => 1.0,
            };
            let shininess_penalty = match t.shininess_rank {
                Some(rank) if rank > 0 => (1.0 - (rank - 1) as f64 * 0.05).max(0.5),
                _ => 1.0,
            };
            let raw = (priority_weight + longevity_factor)
                * quick_win_boost
                * urgency_component
                * shininess_penalty;
            RankedTask {
                id: t.id.clone(),
                content: t.content.clone(),
                score: round4(raw),
                category: t.category.clone(),
                priority_group: t.priority_group,
                longevity: t.longevity,
                urgency_rank: t.urgency_rank,
                shininess_rank: t.shininess_rank,
                quick_win: t.quick_win,
            }
        })
        .collect();

    ranking.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranking
}

fn priority_weight(group: Option<i64>) -> f64 {
    match group {
        Some(1) => 5.0, // Must
        Some(2) => 3.5, // Need
        Some(3) => 2.0, // Should
        Some(4) => 1.0, // Want
        _ => 2.0,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn build_summary(ranking: &[RankedTask]) -> String {
    let top: Vec<String> = ranking
        .iter()
        .take(3)
        .map(|t| format!("\"{}\"", truncate(&t.content, 40)))
        .collect();
    let quick_wins = ranking.iter().filter(|t| t.quick_win).count();
    let avg = ranking.iter().map(|t| t.score).sum::<f64>() / ranking.len() as f64;
    format!(
        "Top focus: {}. {} quick wins. Avg score {:.2}.",
        top.join(", "),
        quick_wins,
        avg
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let cut: String = s.chars().take(max_chars - 1).collect();
        format!("{cut}…")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, content: &str) -> TaskRow {
        TaskRow {
            id: id.to_string(),
            braindump_id: "bd".to_string(),
            position: 0,
            content: content.to_string(),
            normalized: content.to_lowercase(),
            category: None,
            priority: None,
            priority_group: None,
            action: "keep".to_string(),
            quick_win: false,
            status: "todo".to_string(),
            source: "braindump".to_string(),
            longevity: 0,
            urgency_rank: None,
            shininess_rank: None,
            score: None,
            overall_rank: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn priority_weight_mapping() {
        assert_eq!(priority_weight(Some(1)), 5.0);
        assert_eq!(priority_weight(Some(2)), 3.5);
        assert_eq!(priority_weight(Some(3)), 2.0);
        assert_eq!(priority_weight(Some(4)), 1.0);
        assert_eq!(priority_weight(None), 2.0);
        assert_eq!(priority_weight(Some(9)), 2.0);
    }

    #[test]
    fn bare_task_scores_its_priority_weight() {
        let mut a = row("a", "ship the release");
        a.priority_group = Some(1);
        let ranking = compute_scores(&[a]);
        assert_eq!(ranking[0].score, 5.0);
    }

    #[test]
    fn longevity_and_quick_win_alone_do_not_beat_must_priority() {
        let mut a = row("a", "ship the release");
        a.priority_group = Some(1);
        let mut b = row("b", "water plants");
        b.priority_group = Some(4);
        b.longevity = 10;
        b.quick_win = true;
        let ranking = compute_scores(&[a, b]);
        // (1.0 + 2.0) × 1.25 = 3.75 against a plain 5.0
        assert_eq!(ranking[0].id, "a");
        assert_eq!(ranking[1].score, 3.75);
    }

    #[test]
    fn recurring_quick_win_outranks_must_priority_with_urgency() {
        let mut a = row("a", "ship the release");
        a.priority_group = Some(1);
        let mut b = row("b", "water plants");
        b.priority_group = Some(4);
        b.longevity = 10;
        b.quick_win = true;
        b.urgency_rank = Some(1);
        let ranking = compute_scores(&[a, b]);
        // 3.75 × (1 + 1/1) = 7.5 rebalances past the bare Must task.
        assert_eq!(ranking[0].id, "b");
        assert_eq!(ranking[0].score, 7.5);
        assert_eq!(ranking[1].id, "a");
    }

    #[test]
    fn shininess_penalty_floors_at_half() {
        let mut a = row("a", "chase the shiny rewrite");
        a.priority_group = Some(1);
        a.shininess_rank = Some(30);
        let ranking = compute_scores(&[a]);
        assert_eq!(ranking[0].score, 2.5);
    }

    #[test]
    fn scores_round_to_four_decimals() {
        let mut a = row("a", "follow up with the team");
        a.priority_group = Some(3);
        a.urgency_rank = Some(3);
        let ranking = compute_scores(&[a]);
        // 2.0 × (1 + 1/3) = 2.666666…
        assert_eq!(ranking[0].score, 2.6667);
    }

    #[test]
    fn equal_scores_keep_input_order() {
        let mut a = row("a", "first in the dump");
        a.priority_group = Some(3);
        let mut b = row("b", "second in the dump");
        b.priority_group = Some(3);
        let ranking = compute_scores(&[a, b]);
        assert_eq!(ranking[0].id, "a");
        assert_eq!(ranking[1].id, "b");
    }

    #[test]
    fn summary_quotes_and_truncates_top_content() {
        let mut a = row("a", "a very descriptive task line that runs well past forty characters");
        a.priority_group = Some(1);
        let mut b = row("b", "water plants");
        b.priority_group = Some(4);
        b.quick_win = true;
        let ranking = compute_scores(&[a, b]);
        let summary = build_summary(&ranking);
        assert!(summary.starts_with("Top focus: \"a very descriptive task line that runs w…\""));
        assert!(summary.contains("1 quick wins."));
        assert!(summary.ends_with("."));
    }

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("short", 40), "short");
        let exactly_40 = "x".repeat(40);
        assert_eq!(truncate(&exactly_40, 40), exactly_40);
        assert_eq!(truncate(&"x".repeat(41), 40).chars().count(), 40);
    }
}
