//! Pattern sets used by the classifier.

use regex::Regex;
use std::sync::OnceLock;

/// A named, compiled pattern.
#[derive(Debug)]
pub struct Pattern {
    /// Short name, used in logs.
    pub name: &'static str,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern. Only called with constant expressions.
    fn new(name: &'static str, pattern: &str) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Checks if the pattern matches the given text.
    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Returns true if any pattern in `set` matches `text`.
pub fn any_match(set: &[Pattern], text: &str) -> bool {
    set.iter().any(|p| p.matches(text))
}

/// Patterns indicating the program is asking the user something.
pub fn prompt_patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Pattern::new("yes_no", r"(?i)\[y/n\]"),
            Pattern::new("continue", r"(?i)continue\?"),
            Pattern::new("proceed", r"(?i)proceed\?"),
            Pattern::new("do_you_want", r"(?i)do you want to"),
            Pattern::new("would_you_like", r"(?i)would you like to"),
        ]
    })
}

/// Patterns indicating an error was printed.
pub fn error_patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Pattern::new("error", r"(?i)error:"),
            Pattern::new("exception", r"(?i)exception:"),
            Pattern::new("fatal", r"(?i)fatal:"),
            Pattern::new("failed", r"(?i)failed:"),
            Pattern::new("cannot", r"(?i)cannot"),
            Pattern::new("unable_to", r"(?i)unable to"),
        ]
    })
}

/// Patterns indicating the task has finished.
pub fn completion_patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Pattern::new("task_completed", r"(?i)task completed"),
            Pattern::new("done", r"(?i)done"),
            Pattern::new("finished", r"(?i)finished"),
            Pattern::new("success", r"(?i)success"),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_patterns_case_insensitive() {
        assert!(any_match(prompt_patterns(), "Overwrite file? [Y/n]"));
        assert!(any_match(prompt_patterns(), "Do you want to proceed"));
        assert!(any_match(prompt_patterns(), "WOULD YOU LIKE TO continue"));
        assert!(!any_match(prompt_patterns(), "continue reading"));
    }

    #[test]
    fn test_error_patterns() {
        assert!(any_match(error_patterns(), "Error: file missing"));
        assert!(any_match(error_patterns(), "fatal: not a git repository"));
        assert!(any_match(error_patterns(), "Cannot find module"));
        assert!(!any_match(error_patterns(), "all good"));
    }

    #[test]
    fn test_completion_patterns() {
        assert!(any_match(completion_patterns(), "Task completed in 3s"));
        assert!(any_match(completion_patterns(), "Build SUCCESSFUL"));
        assert!(!any_match(completion_patterns(), "working on it"));
    }
}
