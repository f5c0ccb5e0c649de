//! Pattern-based classification of cleaned output.
//!
//! Prompt and completion checks only look at the last few lines, so text
//! scrolled far above the cursor cannot trigger them. The error check scans
//! everything.

use serde::Serialize;

use crate::normalize::clean_output;
use crate::patterns::{any_match, completion_patterns, error_patterns, prompt_patterns};

/// Lines examined for interactive prompts.
pub const PROMPT_WINDOW_LINES: usize = 5;

/// Lines examined for completion markers.
pub const COMPLETION_WINDOW_LINES: usize = 3;

fn trailing_window(cleaned: &str, lines: usize) -> String {
    let all: Vec<&str> = cleaned.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// True if the last lines ask the user something (`[y/n]`, `continue?`, ...).
pub fn is_awaiting_input(text: &str) -> bool {
    let cleaned = clean_output(text);
    any_match(prompt_patterns(), &trailing_window(&cleaned, PROMPT_WINDOW_LINES))
}

/// True if an error marker appears anywhere in the output.
pub fn has_error(text: &str) -> bool {
    any_match(error_patterns(), &clean_output(text))
}

/// True if the last lines say the task is done.
pub fn is_task_completed(text: &str) -> bool {
    let cleaned = clean_output(text);
    any_match(
        completion_patterns(),
        &trailing_window(&cleaned, COMPLETION_WINDOW_LINES),
    )
}

/// True if two captures are identical once cleaned.
pub fn is_output_stable(previous: &str, current: &str) -> bool {
    clean_output(previous) == clean_output(current)
}

/// All classifier verdicts for one capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputClassification {
    /// The program is waiting on a prompt.
    pub awaiting_input: bool,
    /// An error marker was found.
    pub has_error: bool,
    /// A completion marker was found.
    pub completed: bool,
    /// Last line that carries an error marker.
    pub error_line: Option<String>,
}

impl OutputClassification {
    /// Runs every predicate over `text`.
    pub fn classify(text: &str) -> Self {
        let cleaned = clean_output(text);
        let error_line = cleaned
            .lines()
            .rev()
            .find(|line| any_match(error_patterns(), line))
            .map(|line| line.trim().to_string());

        Self {
            awaiting_input: any_match(
                prompt_patterns(),
                &trailing_window(&cleaned, PROMPT_WINDOW_LINES),
            ),
            has_error: error_line.is_some(),
            completed: any_match(
                completion_patterns(),
                &trailing_window(&cleaned, COMPLETION_WINDOW_LINES),
            ),
            error_line,
        }
    }
}

/// Counts how many consecutive captures came back unchanged.
#[derive(Debug, Clone, Default)]
pub struct StabilityTracker {
    last: Option<String>,
    unchanged_polls: u32,
}

impl StabilityTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a capture. Returns true if it differs from the previous one.
    pub fn observe(&mut self, raw: &str) -> bool {
        let cleaned = clean_output(raw);
        let changed = self.last.as_deref() != Some(cleaned.as_str());
        if changed {
            self.unchanged_polls = 0;
            self.last = Some(cleaned);
        } else {
            self.unchanged_polls += 1;
        }
        changed
    }

    /// Number of captures in a row that matched their predecessor.
    pub fn unchanged_polls(&self) -> u32 {
        self.unchanged_polls
    }

    /// True once `required` consecutive captures were unchanged.
    pub fn is_stable(&self, required: u32) -> bool {
        self.last.is_some() && self.unchanged_polls >= required
    }

    /// Most recent cleaned capture.
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}
