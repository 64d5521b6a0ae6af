//! Prompt construction for braindump analysis.
//!
//! One prompt per analysis request. It embeds the whole rule set the
//! reconciliation layer later enforces (priority scale, duplicate policy,
//! output schema) plus the user's lines verbatim, so a well-behaved model
//! response needs no repair at all. Fields the server always derives itself
//! (`normalized`, `categories`, `stats`) are deliberately absent from the
//! requested schema.

/// Task entry and envelope shape the model must return. Kept free of format
/// placeholders so it can be spliced into the prompt template.
const OUTPUT_SCHEMA: &str = r#"{
  "tasks": [
    {
      "line": "original exact line text",
      "suggested_category": "string",
      "suggested_priority": 3,
      "action": "keep",
      "rationale": "brief reason, at most 120 chars, positive tone",
      "subtasks": [],
      "time_estimate_minutes": null,
      "energy_level": "medium",
      "quick_win": false,
      "blocking": false,
      "dependencies": []
    }
  ],
  "summary": "motivating summary",
  "detected_duplicates": [
    { "existing_task_index": 0, "new_task_index": 1, "similarity": 0.92 }
  ],
  "focus_suggestion": {
    "today_top_3": [0],
    "batching_groups": [
      { "label": "context label", "task_indices": [0, 1] }
    ],
    "first_next_action": { "task_index": 0, "why": "short why" }
  }
}"#;

/// Build the analysis prompt for a parsed, non-empty line list.
pub fn build_analysis_prompt(lines: &[String]) -> String {
    let joined = lines.join("\n");
    format!(
        "You are triaging a user's raw braindump of work tasks, one item per line. \
         Act like a practical, encouraging planner. Never judgmental.\n\
         \n\
         Braindump input, each line one raw item, preserve wording exactly in the \"line\" field:\n\
         {joined}\n\
         \n\
         RULES:\n\
         Treat every line as a potential task, even vague ones. NEVER invent tasks that are not \
         in the input, and never reorder, merge, or drop lines from the tasks array.\n\
         If a line is only a heading like \"Frontend\" or \"Marketing\", set action to \"clarify\".\n\
         suggested_priority scale: 5 urgent or unblocking others, 4 important soon, 3 standard, \
         2 nice progression, 1 optional.\n\
         quick_win: true when the task likely takes under 15 minutes or has very low ambiguity.\n\
         energy_level: cognitive demand, one of low, medium, high.\n\
         blocking: true when the task is a prerequisite for other work.\n\
         subtasks: at most 3, only when the line clearly implies several sequential steps, \
         otherwise an empty array.\n\
         time_estimate_minutes: whole number between 5 and 240, or null when too vague to guess.\n\
         action: keep, merge (duplicate of another line, also record it in detected_duplicates), \
         clarify (needs the user before scheduling), or drop (non-actionable). Prefer clarify \
         over drop.\n\
         \n\
         DUPLICATES:\n\
         Mark a pair only when both lines name the same concrete deliverable, not merely the \
         same topic. similarity is 0 to 1 with two decimals; include only pairs at 0.85 or \
         above. Indices are 0-based positions in the tasks array.\n\
         \n\
         FOCUS:\n\
         today_top_3: up to three 0-based indices mixing one quick win, one meaningful item, \
         one foundational item. Fewer tasks means a shorter list; never pad.\n\
         batching_groups: zero to three groups of tasks doable in one sitting, each with at \
         least two task_indices.\n\
         first_next_action: exactly one small momentum-building task plus a short why.\n\
         summary: one or two encouraging sentences.\n\
         \n\
         OUTPUT, return exactly this JSON shape with no prose and no markdown fences:\n\
         {OUTPUT_SCHEMA}\n\
         \n\
         VALIDATION:\n\
         The tasks array must have one entry per input line in the original order. Every index \
         must exist in the tasks array. detected_duplicates is [] when there are none."
    )
}
