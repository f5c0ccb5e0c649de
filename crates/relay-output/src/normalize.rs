//! Normalization of raw terminal captures.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Lines kept from the start of a long capture.
pub const DEFAULT_FIRST_LINES: usize = 100;

/// Lines kept from the end of a long capture.
pub const DEFAULT_LAST_LINES: usize = 50;

/// Escape sequences: OSC (to BEL or ST), CSI, charset selection and
/// two-byte mode changes such as keypad switching.
static ESCAPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
        r"|\x1b\[[0-?]*[ -/]*[@-~]",
        r"|\x1b[()*+][0-9A-Za-z]",
        r"|\x1b[=>78cDEHMNOZ\\]",
    ))
    .expect("Invalid escape regex")
});

/// C0/C1 control characters other than tab, newline and carriage return.
static CONTROL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F\x{80}-\x{9F}]").expect("Invalid control regex")
});

/// A cleaned capture, bounded for chat-sized display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureResult {
    /// The whole cleaned capture.
    pub full_output: String,
    /// `full_output`, or head + omission marker + tail when too long.
    pub summary: String,
    /// True when `summary` elides lines.
    pub is_truncated: bool,
    /// Line count of `full_output`.
    pub total_lines: usize,
}

/// Removes escape sequences and non-printable control bytes.
///
/// Tabs, newlines, carriage returns and printable Unicode are kept.
///
/// # Example
/// ```
/// use relay_output::remove_ansi_codes;
///
/// assert_eq!(remove_ansi_codes("\x1b[1;31mred\x1b[0m text"), "red text");
/// ```
pub fn remove_ansi_codes(text: &str) -> String {
    let without_escapes = ESCAPE_REGEX.replace_all(text, "");
    CONTROL_REGEX.replace_all(&without_escapes, "").into_owned()
}

/// Strips escapes, right-trims each line, and drops blank lines at both ends.
///
/// Input that is entirely blank becomes the empty string.
pub fn clean_output(text: &str) -> String {
    let stripped = remove_ansi_codes(text);
    let lines: Vec<&str> = stripped.split('\n').map(str::trim_end).collect();

    let Some(first) = lines.iter().position(|l| !l.is_empty()) else {
        return String::new();
    };
    let last = lines.iter().rposition(|l| !l.is_empty()).unwrap_or(first);

    lines[first..=last].join("\n")
}

/// Cleans a raw capture and bounds it to `first_lines` + `last_lines`.
///
/// Captures that fit are returned whole. Longer ones keep the first and last
/// lines with a marker stating exactly how many lines were left out.
pub fn process_capture_result(raw: &str, first_lines: usize, last_lines: usize) -> CaptureResult {
    let cleaned = clean_output(raw);
    let lines: Vec<&str> = if cleaned.is_empty() {
        Vec::new()
    } else {
        cleaned.split('\n').collect()
    };
    let total_lines = lines.len();

    if total_lines <= first_lines + last_lines {
        return CaptureResult {
            summary: cleaned.clone(),
            full_output: cleaned,
            is_truncated: false,
            total_lines,
        };
    }

    let omitted = total_lines - first_lines - last_lines;
    let mut parts: Vec<String> = Vec::with_capacity(3);
    if first_lines > 0 {
        parts.push(lines[..first_lines].join("\n"));
    }
    parts.push(format!("... [{} lines omitted] ...", omitted));
    if last_lines > 0 {
        parts.push(lines[total_lines - last_lines..].join("\n"));
    }

    CaptureResult {
        summary: parts.join("\n"),
        full_output: cleaned,
        is_truncated: true,
        total_lines,
    }
}
