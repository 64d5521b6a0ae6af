//! Reconciliation of model output against the authoritative line list.
//!
//! The model is an untrusted collaborator: it may drop, merge, reorder or
//! invent lines, return out-of-range numbers, or skip fields. This layer
//! forces whatever came back into alignment with the parsed input, position
//! by position. An entry survives only when it parses into the documented
//! shape and its `line` matches the original text exactly; anything else is
//! rebuilt from the heuristics for that single line. Stats and the category
//! set are always derived from the final task array, never taken from the
//! model.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::heuristics;
use super::lines::normalize_line;
use super::types::{
    AnalysisResult, AnalysisStats, BatchingGroup, DuplicateRelation, EnergyLevel, FirstNextAction,
    FocusSuggestion, TaskAction, TaskSuggestion,
};
use crate::config::AnalysisConfig;

/// Cap on the deduplicated category set in an analysis response.
pub const MAX_CATEGORIES: usize = 8;

/// Cap on per-task subtasks.
pub const MAX_SUBTASKS: usize = 3;

/// Rationale attached to entries rebuilt after an alignment failure.
pub const RECOVERY_RATIONALE: &str = "Rebuilt from line heuristics after a misaligned model response";

// ─── Model wire shape ───────────────────────────────────────────────────────

/// The envelope the model is asked to produce.
///
/// Collections are held as raw JSON so a single malformed entry costs only
/// that entry, not the whole response. Entry-level parsing happens during
/// reconciliation.
#[derive(Debug, Default, Deserialize)]
pub struct ModelAnalysis {
    #[serde(default)]
    pub tasks: Vec<Value>,
    #[serde(default)]
    pub detected_duplicates: Vec<Value>,
    #[serde(default)]
    pub focus_suggestion: Option<Value>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Strict per-entry task shape. Core fields are required; derivable fields
/// fall back to the line heuristics when absent.
#[derive(Debug, Deserialize)]
struct ModelTask {
    line: String,
    suggested_category: String,
    suggested_priority: i64,
    action: TaskAction,
    rationale: String,
    #[serde(default)]
    subtasks: Vec<String>,
    #[serde(default)]
    time_estimate_minutes: Option<i64>,
    #[serde(default)]
    energy_level: Option<EnergyLevel>,
    #[serde(default)]
    quick_win: Option<bool>,
    #[serde(default)]
    blocking: Option<bool>,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelDuplicate {
    existing_task_index: i64,
    new_task_index: i64,
    similarity: f64,
}

#[derive(Debug, Deserialize)]
struct ModelFocus {
    #[serde(default)]
    today_top_3: Vec<i64>,
    #[serde(default)]
    batching_groups: Vec<ModelBatchingGroup>,
    first_next_action: ModelFirstNextAction,
}

#[derive(Debug, Deserialize)]
struct ModelBatchingGroup {
    label: String,
    #[serde(default)]
    task_indices: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct ModelFirstNextAction {
    task_index: i64,
    why: String,
}

// ─── Reconciliation ─────────────────────────────────────────────────────────

/// Merge a model response with the parsed line list into a complete,
/// schema-valid [`AnalysisResult`].
pub fn reconcile(lines: &[String], model: ModelAnalysis, config: &AnalysisConfig) -> AnalysisResult {
    if lines.is_empty() {
        return AnalysisResult::empty();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut tasks = Vec::with_capacity(lines.len());
    let mut rebuilt = 0usize;

    for (position, line) in lines.iter().enumerate() {
        let entry = model
            .tasks
            .get(position)
            .and_then(|v| serde_json::from_value::<ModelTask>(v.clone()).ok());

        let task = match entry {
            Some(t) if t.line == *line => keep_model_task(line, t),
            other => {
                rebuilt += 1;
                if other.is_some() {
                    warn!(position, "model task line mismatch, rebuilding from heuristics");
                } else {
                    warn!(position, "model task missing or malformed, rebuilding from heuristics");
                }
                let earlier_duplicate = seen.contains(&normalize_line(line));
                let mut t = heuristics::suggest_line(line, earlier_duplicate);
                t.rationale = RECOVERY_RATIONALE.to_string();
                t
            }
        };
        seen.insert(task.normalized.clone());
        tasks.push(task);
    }

    if model.tasks.len() > lines.len() {
        warn!(
            extra = model.tasks.len() - lines.len(),
            "model returned more tasks than input lines, ignoring extras"
        );
    }
    if rebuilt > 0 {
        debug!(rebuilt, total = lines.len(), "reconciliation repaired misaligned entries");
    }

    let duplicates = reconcile_duplicates(model.detected_duplicates, lines.len(), config);
    let focus = reconcile_focus(model.focus_suggestion, &tasks);
    let summary = match model.summary {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => heuristics::fallback_summary(&tasks),
    };

    assemble(tasks, duplicates, focus, summary)
}

/// Build the final suggestion from a model entry whose line matched exactly:
/// re-normalize, clamp ranges, truncate subtasks, and fill derivable gaps
/// from the line itself.
fn keep_model_task(line: &str, entry: ModelTask) -> TaskSuggestion {
    let traits = heuristics::line_traits(line);
    let mut subtasks = entry.subtasks;
    subtasks.truncate(MAX_SUBTASKS);

    let time_estimate_minutes = match entry.time_estimate_minutes {
        Some(m) if m <= 0 => None,
        Some(m) => Some(m.clamp(5, 240) as u32),
        None => Some(traits.time_estimate_minutes),
    };

    TaskSuggestion {
        line: line.to_string(),
        normalized: normalize_line(line),
        suggested_category: entry.suggested_category,
        suggested_priority: entry.suggested_priority.clamp(1, 5) as u8,
        action: entry.action,
        rationale: entry.rationale,
        subtasks,
        time_estimate_minutes,
        energy_level: entry.energy_level.unwrap_or(traits.energy_level),
        quick_win: entry.quick_win.unwrap_or(traits.quick_win),
        blocking: entry.blocking.unwrap_or(traits.blocking),
        dependencies: entry.dependencies,
    }
}

/// Validate the model's self-reported duplicate pairs. They are an
/// independent signal and are not recomputed here, but each pair must
/// reference valid distinct indices and clear the similarity floor.
fn reconcile_duplicates(
    raw: Vec<Value>,
    task_count: usize,
    config: &AnalysisConfig,
) -> Vec<DuplicateRelation> {
    let mut kept: HashSet<(usize, usize)> = HashSet::new();
    let mut out = Vec::new();
    for value in raw {
        let Ok(dup) = serde_json::from_value::<ModelDuplicate>(value) else {
            continue;
        };
        let (Ok(a), Ok(b)) = (
            usize::try_from(dup.existing_task_index),
            usize::try_from(dup.new_task_index),
        ) else {
            continue;
        };
        if a == b || a >= task_count || b >= task_count {
            continue;
        }
        let (a, b) = if a < b { (a, b) } else { (b, a) };
        let similarity = dup.similarity.min(1.0);
        if similarity < config.model_duplicate_floor {
            continue;
        }
        if kept.insert((a, b)) {
            out.push(DuplicateRelation {
                existing_task_index: a,
                new_task_index: b,
                similarity,
            });
        }
    }
    out
}

/// Keep the model's focus suggestion where its indices check out; filter
/// everything that points outside the task array. A missing or unparseable
/// suggestion is replaced wholesale by the heuristic one.
fn reconcile_focus(raw: Option<Value>, tasks: &[TaskSuggestion]) -> FocusSuggestion {
    let parsed = raw.and_then(|v| serde_json::from_value::<ModelFocus>(v).ok());
    let Some(focus) = parsed else {
        debug!("model focus suggestion missing, substituting heuristic focus");
        return heuristics::focus_suggestion(tasks);
    };

    let n = tasks.len();
    let mut top_3 = Vec::new();
    for idx in focus.today_top_3 {
        if let Ok(i) = usize::try_from(idx) {
            if i < n && !top_3.contains(&i) && top_3.len() < 3 {
                top_3.push(i);
            }
        }
    }

    let batching_groups: Vec<BatchingGroup> = focus
        .batching_groups
        .into_iter()
        .filter_map(|g| {
            let label = g.label.trim().to_string();
            if label.is_empty() {
                return None;
            }
            let mut indices = Vec::new();
            for idx in g.task_indices {
                if let Ok(i) = usize::try_from(idx) {
                    if i < n && !indices.contains(&i) {
                        indices.push(i);
                    }
                }
            }
            (indices.len() >= 2).then(|| BatchingGroup {
                label,
                task_indices: indices,
            })
        })
        .take(3)
        .collect();

    let first_next_action = match usize::try_from(focus.first_next_action.task_index) {
        Ok(i) if i < n => FirstNextAction {
            task_index: i,
            why: focus.first_next_action.why,
        },
        _ => {
            warn!("model first_next_action index out of range, rebuilding");
            heuristics::focus_suggestion(tasks).first_next_action
        }
    };

    FocusSuggestion {
        today_top_3: top_3,
        batching_groups,
        first_next_action,
    }
}

// ─── Assembly ───────────────────────────────────────────────────────────────

/// Finish a result from an already-aligned task array: derive the category
/// set and stats, which are never model-authored. Shared by the model and
/// heuristic paths.
pub(crate) fn assemble(
    tasks: Vec<TaskSuggestion>,
    detected_duplicates: Vec<DuplicateRelation>,
    focus_suggestion: FocusSuggestion,
    summary: String,
) -> AnalysisResult {
    let mut categories: Vec<String> = Vec::new();
    for task in &tasks {
        let slug = slugify(&task.suggested_category);
        if !slug.is_empty() && !categories.contains(&slug) && categories.len() < MAX_CATEGORIES {
            categories.push(slug);
        }
    }

    let categorized = tasks
        .iter()
        .filter(|t| t.suggested_category != "uncategorized")
        .count();
    let stats = AnalysisStats {
        total_tasks: tasks.len(),
        categorized,
        uncategorized: tasks.len() - categorized,
        quick_wins: tasks.iter().filter(|t| t.quick_win).count(),
        estimated_total_minutes: tasks
            .iter()
            .map(|t| u64::from(t.time_estimate_minutes.unwrap_or(0)))
            .sum(),
    };

    AnalysisResult {
        categories,
        tasks,
        summary,
        detected_duplicates,
        focus_suggestion,
        stats,
    }
}

/// Lowercase, alphanumeric runs joined by single underscores.
fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn model_task(line: &str, category: &str, priority: i64) -> Value {
        json!({
            "line": line,
            "suggested_category": category,
            "suggested_priority": priority,
            "action": "keep",
            "rationale": "Model chose this",
            "subtasks": [],
            "time_estimate_minutes": 30,
            "energy_level": "medium",
            "quick_win": false,
            "blocking": false,
            "dependencies": []
        })
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn aligned_entries_are_kept() {
        let input = lines(&["Fix login bug", "Write the release notes"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("Fix login bug", "bug", 5),
                model_task("Write the release notes", "writing", 3),
            ],
            summary: Some("Two tasks today".to_string()),
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.tasks.len(), 2);
        assert_eq!(result.tasks[0].suggested_category, "bug");
        assert_eq!(result.tasks[0].rationale, "Model chose this");
        assert_eq!(result.tasks[0].normalized, "fix login bug");
        assert_eq!(result.tasks[1].suggested_category, "writing");
        assert_eq!(result.summary, "Two tasks today");
    }

    #[test]
    fn line_mismatch_rebuilds_that_entry() {
        let input = lines(&["Fix login bug", "Write the release notes"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("Fix login bug", "bug", 5),
                model_task("Write release notes", "writing", 3), // reworded by the model
            ],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.tasks[0].rationale, "Model chose this");
        assert_eq!(result.tasks[1].line, "Write the release notes");
        assert_eq!(result.tasks[1].rationale, RECOVERY_RATIONALE);
    }

    #[test]
    fn missing_tail_is_rebuilt() {
        let input = lines(&["Fix login bug", "buy milk"]);
        let model = ModelAnalysis {
            tasks: vec![model_task("Fix login bug", "bug", 5)],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.tasks.len(), 2);
        assert_eq!(result.tasks[1].line, "buy milk");
        assert_eq!(result.tasks[1].suggested_category, "quick_win");
        assert_eq!(result.tasks[1].rationale, RECOVERY_RATIONALE);
    }

    #[test]
    fn extra_model_tasks_are_ignored() {
        let input = lines(&["Fix login bug"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("Fix login bug", "bug", 5),
                model_task("Invented task", "bug", 5),
            ],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.tasks.len(), 1);
    }

    #[test]
    fn malformed_entry_is_rebuilt() {
        let input = lines(&["Fix login bug"]);
        let model = ModelAnalysis {
            tasks: vec![json!({
                "line": "Fix login bug",
                "suggested_category": "bug",
                "suggested_priority": "very high",
                "action": "keep",
                "rationale": "bad types"
            })],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.tasks[0].rationale, RECOVERY_RATIONALE);
        assert_eq!(result.tasks[0].suggested_category, "bug");
    }

    #[test]
    fn priority_is_clamped_into_range() {
        let input = lines(&["Fix login bug", "buy milk"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("Fix login bug", "bug", 9),
                model_task("buy milk", "errands", 0),
            ],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.tasks[0].suggested_priority, 5);
        assert_eq!(result.tasks[1].suggested_priority, 1);
    }

    #[test]
    fn time_estimates_are_repaired() {
        let input = lines(&["task one here now", "task two here now", "task three here now"]);
        let mut t0 = model_task("task one here now", "misc", 3);
        t0["time_estimate_minutes"] = json!(-10);
        let mut t1 = model_task("task two here now", "misc", 3);
        t1["time_estimate_minutes"] = json!(2000);
        let mut t2 = model_task("task three here now", "misc", 3);
        t2.as_object_mut().unwrap().remove("time_estimate_minutes");
        let model = ModelAnalysis {
            tasks: vec![t0, t1, t2],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.tasks[0].time_estimate_minutes, None);
        assert_eq!(result.tasks[1].time_estimate_minutes, Some(240));
        // four words, derived from the line
        assert_eq!(result.tasks[2].time_estimate_minutes, Some(20));
    }

    #[test]
    fn subtasks_are_truncated() {
        let input = lines(&["refactor the billing module"]);
        let mut t = model_task("refactor the billing module", "engineering", 4);
        t["subtasks"] = json!(["a", "b", "c", "d", "e"]);
        let model = ModelAnalysis {
            tasks: vec![t],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.tasks[0].subtasks, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicates_below_floor_are_dropped() {
        let input = lines(&["Fix login bug", "fix the login bug"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("Fix login bug", "bug", 5),
                model_task("fix the login bug", "bug", 5),
            ],
            detected_duplicates: vec![
                json!({"existing_task_index": 0, "new_task_index": 1, "similarity": 0.8}),
            ],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert!(result.detected_duplicates.is_empty());
    }

    #[test]
    fn duplicates_are_validated_and_normalized() {
        let input = lines(&["a b c d", "a b c e", "something else entirely"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("a b c d", "misc", 3),
                model_task("a b c e", "misc", 3),
                model_task("something else entirely", "misc", 3),
            ],
            detected_duplicates: vec![
                // reversed order: normalized to (0, 1)
                json!({"existing_task_index": 1, "new_task_index": 0, "similarity": 0.9}),
                // duplicate of the pair above
                json!({"existing_task_index": 0, "new_task_index": 1, "similarity": 0.9}),
                // self pair
                json!({"existing_task_index": 2, "new_task_index": 2, "similarity": 0.99}),
                // out of range
                json!({"existing_task_index": 0, "new_task_index": 7, "similarity": 0.95}),
                // similarity above 1.0 is capped
                json!({"existing_task_index": 1, "new_task_index": 2, "similarity": 1.4}),
                // negative index
                json!({"existing_task_index": -1, "new_task_index": 1, "similarity": 0.9}),
            ],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.detected_duplicates.len(), 2);
        assert_eq!(result.detected_duplicates[0].existing_task_index, 0);
        assert_eq!(result.detected_duplicates[0].new_task_index, 1);
        assert_eq!(result.detected_duplicates[1].similarity, 1.0);
    }

    #[test]
    fn missing_focus_uses_heuristic_focus() {
        let input = lines(&["buy milk", "waiting on legal review for the launch"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("buy milk", "errands", 2),
                model_task("waiting on legal review for the launch", "legal", 4),
            ],
            focus_suggestion: None,
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert!(!result.focus_suggestion.today_top_3.is_empty());
        assert_eq!(result.focus_suggestion.first_next_action.task_index, 0);
    }

    #[test]
    fn focus_indices_are_filtered() {
        let input = lines(&["task one here", "task two here"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("task one here", "misc", 3),
                model_task("task two here", "misc", 3),
            ],
            focus_suggestion: Some(json!({
                "today_top_3": [0, 9, 1, 0],
                "batching_groups": [
                    {"label": "misc", "task_indices": [0, 1, 44]},
                    {"label": "ghost", "task_indices": [12, 13]}
                ],
                "first_next_action": {"task_index": 5, "why": "out of range"}
            })),
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        let focus = &result.focus_suggestion;
        assert_eq!(focus.today_top_3, vec![0, 1]);
        assert_eq!(focus.batching_groups.len(), 1);
        assert_eq!(focus.batching_groups[0].task_indices, vec![0, 1]);
        // rebuilt because index 5 does not exist
        assert!(focus.first_next_action.task_index < 2);
        assert_ne!(focus.first_next_action.why, "out of range");
    }

    #[test]
    fn empty_summary_falls_back() {
        let input = lines(&["buy milk"]);
        let model = ModelAnalysis {
            tasks: vec![model_task("buy milk", "errands", 2)],
            summary: Some("   ".to_string()),
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.summary, "Identified 1 tasks (0 quick wins, 1 categorized).");
    }

    #[test]
    fn stats_are_recomputed_from_final_tasks() {
        let input = lines(&["fix login bug", "an unusual chore without keywords today"]);
        let model = ModelAnalysis {
            tasks: vec![
                model_task("fix login bug", "bug", 5),
                model_task("an unusual chore without keywords today", "uncategorized", 3),
            ],
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.stats.total_tasks, 2);
        assert_eq!(result.stats.categorized, 1);
        assert_eq!(result.stats.uncategorized, 1);
        assert_eq!(result.stats.estimated_total_minutes, 60);
    }

    #[test]
    fn categories_are_slugged_and_capped() {
        let input: Vec<String> = (0..10).map(|i| format!("task number {i} for today")).collect();
        let tasks: Vec<Value> = input
            .iter()
            .enumerate()
            .map(|(i, line)| model_task(line, &format!("Category {i}!"), 3))
            .collect();
        let model = ModelAnalysis {
            tasks,
            ..Default::default()
        };
        let result = reconcile(&input, model, &config());
        assert_eq!(result.categories.len(), MAX_CATEGORIES);
        assert_eq!(result.categories[0], "category_0");
    }

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Deep Work!"), "deep_work");
        assert_eq!(slugify("  bug  "), "bug");
        assert_eq!(slugify("quick win"), "quick_win");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let result = reconcile(&[], ModelAnalysis::default(), &config());
        assert!(result.tasks.is_empty());
        assert_eq!(result.stats.total_tasks, 0);
    }

    proptest! {
        // Alignment must survive arbitrary model task arrays.
        #[test]
        fn order_is_preserved_under_arbitrary_model_output(
            input in proptest::collection::vec("[a-zA-Z][a-zA-Z ]{0,30}", 1..8),
            model_lines in proptest::collection::vec("[a-zA-Z ]{0,30}", 0..10),
        ) {
            let input: Vec<String> =
                input.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            prop_assume!(!input.is_empty());
            let model = ModelAnalysis {
                tasks: model_lines.iter().map(|l| model_task(l, "misc", 3)).collect(),
                ..Default::default()
            };
            let result = reconcile(&input, model, &config());
            prop_assert_eq!(result.tasks.len(), input.len());
            for (i, task) in result.tasks.iter().enumerate() {
                prop_assert_eq!(&task.line, &input[i]);
            }
        }
    }
}
