//! Shared types for the braindump analysis pipeline.
//!
//! These are the wire shapes returned by `POST /api/v1/braindumps/analyze`.
//! Both the model path and the heuristic fallback produce exactly this
//! structure, so clients never need to know which path ran.

use serde::{Deserialize, Serialize};

/// What the review UI should do with a suggested task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    /// Fine as-is.
    Keep,
    /// Should be combined with an earlier duplicate.
    Merge,
    /// Needs user clarification before scheduling (e.g. a bare heading).
    Clarify,
    /// Non-actionable or redundant after merge.
    Drop,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::Merge => "merge",
            Self::Clarify => "clarify",
            Self::Drop => "drop",
        }
    }

    /// Only kept and merged tasks survive finalize.
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Keep | Self::Merge)
    }
}

/// Estimated cognitive demand of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

/// One analyzed line of a braindump, in input order.
///
/// `line` always matches the original trimmed input line at the same index;
/// the reconciliation layer enforces this before the result leaves the
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSuggestion {
    pub line: String,
    pub normalized: String,
    pub suggested_category: String,
    /// 1 (optional) .. 5 (urgent); clamped into range by reconciliation.
    pub suggested_priority: u8,
    pub action: TaskAction,
    pub rationale: String,
    #[serde(default)]
    pub subtasks: Vec<String>,
    /// None when the task is too vague to estimate; otherwise 5..=240.
    pub time_estimate_minutes: Option<u32>,
    pub energy_level: EnergyLevel,
    pub quick_win: bool,
    pub blocking: bool,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A pair of task indices judged to express the same concrete outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRelation {
    pub existing_task_index: usize,
    pub new_task_index: usize,
    /// 0.0..=1.0. Heuristic pairs carry the raw Jaccard score; model pairs
    /// carry the model's own similarity judgement.
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingGroup {
    pub label: String,
    /// At least two members; indices into the task array.
    pub task_indices: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstNextAction {
    pub task_index: usize,
    pub why: String,
}

/// Small actionable focus derived from the task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSuggestion {
    /// Up to three task indices; never padded when fewer tasks exist.
    pub today_top_3: Vec<usize>,
    /// Up to three groups of batchable work.
    pub batching_groups: Vec<BatchingGroup>,
    pub first_next_action: FirstNextAction,
}

impl FocusSuggestion {
    pub fn empty() -> Self {
        Self {
            today_top_3: Vec::new(),
            batching_groups: Vec::new(),
            first_next_action: FirstNextAction {
                task_index: 0,
                why: String::new(),
            },
        }
    }
}

/// Aggregate counters, always recomputed from the final task array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub total_tasks: usize,
    pub categorized: usize,
    pub uncategorized: usize,
    pub quick_wins: usize,
    pub estimated_total_minutes: u64,
}

/// The complete analyze response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Deduplicated slug-formatted category set, capped at
    /// [`MAX_CATEGORIES`](crate::braindump::reconcile::MAX_CATEGORIES).
    pub categories: Vec<String>,
    pub tasks: Vec<TaskSuggestion>,
    pub summary: String,
    /// Empty when no duplicates were found, never omitted.
    pub detected_duplicates: Vec<DuplicateRelation>,
    pub focus_suggestion: FocusSuggestion,
    pub stats: AnalysisStats,
}

impl AnalysisResult {
    /// The minimal zeroed result returned for empty or whitespace-only input.
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
            tasks: Vec::new(),
            summary: "No tasks provided".to_string(),
            detected_duplicates: Vec::new(),
            focus_suggestion: FocusSuggestion::empty(),
            stats: AnalysisStats::default(),
        }
    }
}
