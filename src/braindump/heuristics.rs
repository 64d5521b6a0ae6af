//! Deterministic categorization heuristics.
//!
//! Used standalone whenever the model path is unavailable, and per-line by
//! the reconciliation layer to rebuild entries the model mangled. No live AI
//! call — everything here is pattern matching over the raw line.
//!
//! ## Category rules
//!
//! Rules are checked top to bottom; the first match wins. More specific and
//! more urgent signals deliberately outrank the generic shortness check.
//!
//! | # | Pattern | Category | Priority |
//! | - | ------- | -------- | -------- |
//! | 1 | `bug\|fix\|error\|issue` | `bug` | 5 |
//! | 2 | `email\|reply\|respond\|follow up` | `communication` | 3 |
//! | 3 | `plan\|strategy\|roadmap` | `planning` | 4 |
//! | 4 | `learn\|read\|study\|research` | `learning` | 2 |
//! | 5 | `deploy\|monitor\|infrastructure\|server\|ops` | `ops` | 4 |
//! | 6 | word count ≤ 3 | `quick_win` | 2 |
//! | 7 | (none) | `uncategorized` | 3 |

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use super::dedup::detect_duplicates;
use super::lines::{normalize_line, word_count};
use super::reconcile;
use super::types::{
    AnalysisResult, BatchingGroup, EnergyLevel, FirstNextAction, FocusSuggestion, TaskAction,
    TaskSuggestion,
};
use crate::config::AnalysisConfig;

struct CategoryRule {
    pattern: Regex,
    category: &'static str,
    priority: u8,
}

static CATEGORY_RULES: Lazy<Vec<CategoryRule>> = Lazy::new(|| {
    let rule = |pattern: &str, category: &'static str, priority: u8| CategoryRule {
        pattern: Regex::new(&format!("(?i){pattern}")).expect("static rule pattern"),
        category,
        priority,
    };
    vec![
        rule("bug|fix|error|issue", "bug", 5),
        rule("email|reply|respond|follow up", "communication", 3),
        rule("plan|strategy|roadmap", "planning", 4),
        rule("learn|read|study|research", "learning", 2),
        rule("deploy|monitor|infrastructure|server|ops", "ops", 4),
    ]
});

static BLOCKING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("(?i)block|waiting|unblock|depends").expect("static pattern"));

/// A lone word, optionally with a trailing colon — likely a section heading
/// rather than an actionable task.
static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z]+:?$").expect("static pattern"));

/// The word-count boundary below which a line counts as a quick win.
pub const QUICK_WIN_MAX_WORDS: usize = 3;

/// First matching rule wins; short lines fall through to `quick_win`, and
/// everything else lands in `uncategorized`.
pub fn categorize(line: &str) -> (&'static str, u8) {
    for rule in CATEGORY_RULES.iter() {
        if rule.pattern.is_match(line) {
            return (rule.category, rule.priority);
        }
    }
    if word_count(line) <= QUICK_WIN_MAX_WORDS {
        return ("quick_win", 2);
    }
    ("uncategorized", 3)
}

/// Fields derived from the surface shape of a line.
#[derive(Debug, Clone, Copy)]
pub struct LineTraits {
    pub word_count: usize,
    pub quick_win: bool,
    pub blocking: bool,
    pub energy_level: EnergyLevel,
    pub time_estimate_minutes: u32,
}

pub fn line_traits(line: &str) -> LineTraits {
    let words = word_count(line);
    let quick_win = words <= QUICK_WIN_MAX_WORDS;
    let blocking = BLOCKING_RE.is_match(line);
    let energy_level = if quick_win {
        EnergyLevel::Low
    } else if words <= 8 {
        EnergyLevel::Medium
    } else {
        EnergyLevel::High
    };
    let time_estimate_minutes = if quick_win {
        5
    } else {
        (words as u32 * 5).clamp(5, 240)
    };
    LineTraits {
        word_count: words,
        quick_win,
        blocking,
        energy_level,
        time_estimate_minutes,
    }
}

/// Build the heuristic suggestion for one line.
///
/// `earlier_duplicate` is true when a previous line in the same braindump
/// normalized to the same text; such lines are marked for merging.
pub fn suggest_line(line: &str, earlier_duplicate: bool) -> TaskSuggestion {
    let normalized = normalize_line(line);
    let (category, priority) = categorize(line);
    let traits = line_traits(line);

    let action = if earlier_duplicate {
        TaskAction::Merge
    } else if traits.word_count == 1 && HEADING_RE.is_match(line) {
        TaskAction::Clarify
    } else {
        TaskAction::Keep
    };

    let rationale = if traits.quick_win {
        "Short task - fast momentum"
    } else if traits.blocking {
        "Prerequisite that unlocks other work"
    } else {
        "Typical task derived from braindump"
    };

    TaskSuggestion {
        line: line.to_string(),
        normalized,
        suggested_category: category.to_string(),
        suggested_priority: priority,
        action,
        rationale: rationale.to_string(),
        subtasks: Vec::new(),
        time_estimate_minutes: Some(traits.time_estimate_minutes),
        energy_level: traits.energy_level,
        quick_win: traits.quick_win,
        blocking: traits.blocking,
        dependencies: Vec::new(),
    }
}

/// Full heuristic analysis of a parsed braindump — the fallback used when
/// the model path fails or no API key is configured.
pub fn fallback_analysis(lines: &[String], config: &AnalysisConfig) -> AnalysisResult {
    if lines.is_empty() {
        return AnalysisResult::empty();
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut tasks = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let normalized = normalize_line(line);
        let earlier_duplicate = seen.contains_key(&normalized);
        tasks.push(suggest_line(line, earlier_duplicate));
        seen.entry(normalized).or_insert(index);
    }

    let duplicates = detect_duplicates(lines, config.duplicate_threshold)
        .into_iter()
        .map(Into::into)
        .collect();

    let focus = focus_suggestion(&tasks);
    let summary = fallback_summary(&tasks);
    reconcile::assemble(tasks, duplicates, focus, summary)
}

/// Pick a small actionable focus: one quick win, one blocking or
/// high-priority task, the rest by descending priority. Never pads beyond
/// the number of real tasks.
pub fn focus_suggestion(tasks: &[TaskSuggestion]) -> FocusSuggestion {
    if tasks.is_empty() {
        return FocusSuggestion::empty();
    }

    let quick_wins: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.quick_win)
        .map(|(i, _)| i)
        .collect();
    let blocking: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, t)| t.blocking)
        .map(|(i, _)| i)
        .collect();
    let mut by_priority: Vec<usize> = (0..tasks.len()).collect();
    // Stable sort: equal priorities keep input order.
    by_priority.sort_by(|&a, &b| tasks[b].suggested_priority.cmp(&tasks[a].suggested_priority));

    let mut top_3: Vec<usize> = Vec::new();
    let add_unique = |top_3: &mut Vec<usize>, i: usize| {
        if !top_3.contains(&i) && top_3.len() < 3 {
            top_3.push(i);
        }
    };
    if let Some(&first) = quick_wins.first() {
        add_unique(&mut top_3, first);
    }
    if let Some(&first) = blocking.first() {
        add_unique(&mut top_3, first);
    }
    for &i in &by_priority {
        if top_3.len() >= 3 {
            break;
        }
        add_unique(&mut top_3, i);
    }
    for i in 0..tasks.len() {
        if top_3.len() >= 3 {
            break;
        }
        add_unique(&mut top_3, i);
    }

    let batching_groups = batching_groups(tasks);

    let first_next_action = if let Some(&i) = quick_wins.first() {
        FirstNextAction {
            task_index: i,
            why: "Fast win to build momentum".to_string(),
        }
    } else if let Some(&i) = blocking.first() {
        FirstNextAction {
            task_index: i,
            why: "Unblocks other work".to_string(),
        }
    } else {
        FirstNextAction {
            task_index: 0,
            why: "Earliest high-priority item".to_string(),
        }
    };

    FocusSuggestion {
        today_top_3: top_3,
        batching_groups,
        first_next_action,
    }
}

/// Categories with at least two member tasks, in first-appearance order,
/// capped at three groups.
fn batching_groups(tasks: &[TaskSuggestion]) -> Vec<BatchingGroup> {
    let mut order: Vec<&str> = Vec::new();
    for t in tasks {
        if !order.contains(&t.suggested_category.as_str()) {
            order.push(&t.suggested_category);
        }
    }
    order
        .into_iter()
        .map(|cat| BatchingGroup {
            label: cat.to_string(),
            task_indices: tasks
                .iter()
                .enumerate()
                .filter(|(_, t)| t.suggested_category == cat)
                .map(|(i, _)| i)
                .collect(),
        })
        .filter(|g| g.task_indices.len() >= 2)
        .take(3)
        .collect()
}

pub(crate) fn fallback_summary(tasks: &[TaskSuggestion]) -> String {
    let quick_wins = tasks.iter().filter(|t| t.quick_win).count();
    let categorized = tasks
        .iter()
        .filter(|t| t.suggested_category != "uncategorized")
        .count();
    format!(
        "Identified {} tasks ({} quick wins, {} categorized).",
        tasks.len(),
        quick_wins,
        categorized
    )
}
