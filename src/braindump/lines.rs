//! Line parsing and normalization.
//!
//! `parse_lines` turns a raw paste into the ordered task-line sequence that
//! every later stage indexes into; `normalize_line` produces the canonical
//! form used for duplicate keys and the persisted `normalized` column.

/// Split raw input into trimmed, non-empty lines.
///
/// Handles both `\n` and `\r\n` line endings. The index of each returned
/// line is the task position used throughout the pipeline, so the order
/// here is load-bearing.
pub fn parse_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonicalize a task line: lowercase, collapse internal whitespace runs to
/// a single space, trim, and strip any trailing run of `.!?;:,`.
///
/// Idempotent: `normalize_line(normalize_line(x)) == normalize_line(x)`.
/// The trailing strip removes the whole punctuation/space tail in one pass
/// ("done !!" and "done!!" both normalize to "done") so a second application
/// can never find new trailing punctuation.
pub fn normalize_line(line: &str) -> String {
    let lowered = line.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_was_space = false;
    for ch in lowered.trim().chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '.' | '!' | '?' | ';' | ':' | ',')
    })
    .to_string()
}

/// Count whitespace-separated words in a line.
pub fn word_count(line: &str) -> usize {
    line.split_whitespace().count()
}
