//! Compiles backtick notation into segments.

use relay_models::{Key, Segment};
use tracing::trace;

use crate::error::{DslError, Result};

const BACKTICK: char = '`';

/// Compiles `input` into an ordered segment list.
///
/// Text outside backticks is trimmed and typed literally. A backtick run made
/// only of key letters (`r l u d e s`, any case) becomes one key press per
/// letter; a run with no key letters is typed literally. Anything else is an
/// error. Empty runs and whitespace-only text produce nothing.
///
/// # Example
/// ```
/// use relay_dsl::compile;
/// use relay_models::{Key, Segment};
///
/// let segments = compile("`ddd` custom value `e`").unwrap();
/// assert_eq!(
///     segments,
///     vec![
///         Segment::key(Key::Down),
///         Segment::key(Key::Down),
///         Segment::key(Key::Down),
///         Segment::text("custom value"),
///         Segment::key(Key::Enter),
///     ]
/// );
/// ```
pub fn compile(input: &str) -> Result<Vec<Segment>> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while pos < chars.len() {
        if chars[pos] != BACKTICK {
            literal.push(chars[pos]);
            pos += 1;
            continue;
        }

        push_literal(&mut segments, &literal);
        literal.clear();

        let open = pos;
        let Some(len) = chars[open + 1..].iter().position(|&c| c == BACKTICK) else {
            return Err(DslError::Parse {
                position: open,
                message: "unterminated backtick".to_string(),
            });
        };
        let run: String = chars[open + 1..open + 1 + len].iter().collect();
        compile_run(&run, &mut segments)?;
        pos = open + len + 2;
    }
    push_literal(&mut segments, &literal);

    trace!(input_len = input.len(), segments = segments.len(), "compiled notation");
    Ok(segments)
}

fn push_literal(segments: &mut Vec<Segment>, literal: &str) {
    let trimmed = literal.trim();
    if !trimmed.is_empty() {
        segments.push(Segment::text(trimmed));
    }
}

fn compile_run(run: &str, segments: &mut Vec<Segment>) -> Result<()> {
    if run.is_empty() {
        return Ok(());
    }

    let keys: Vec<Option<Key>> = run.chars().map(Key::from_notation).collect();

    if keys.iter().all(Option::is_some) {
        segments.extend(keys.into_iter().flatten().map(Segment::key));
        return Ok(());
    }
    if keys.iter().all(Option::is_none) {
        segments.push(Segment::text(run));
        return Ok(());
    }

    let mut key_chars = Vec::new();
    let mut other_chars = Vec::new();
    for c in run.chars() {
        let bucket = if Key::from_notation(c).is_some() {
            &mut key_chars
        } else {
            &mut other_chars
        };
        if !bucket.contains(&c) {
            bucket.push(c);
        }
    }
    Err(DslError::MixedCharacter {
        run: run.to_string(),
        key_chars,
        other_chars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_run_emits_one_key_per_char() {
        assert_eq!(
            compile("`ddd`").unwrap(),
            vec![
                Segment::key(Key::Down),
                Segment::key(Key::Down),
                Segment::key(Key::Down)
            ]
        );
        assert_eq!(compile("`e`").unwrap(), vec![Segment::key(Key::Enter)]);
    }

    #[test]
    fn test_full_key_alphabet_case_insensitive() {
        assert_eq!(
            compile("`rLuDeS`").unwrap(),
            vec![
                Segment::key(Key::Right),
                Segment::key(Key::Left),
                Segment::key(Key::Up),
                Segment::key(Key::Down),
                Segment::key(Key::Enter),
                Segment::key(Key::Space),
            ]
        );
    }

    #[test]
    fn test_mixed_order_is_preserved() {
        assert_eq!(
            compile("`ddd` custom value `e`").unwrap(),
            vec![
                Segment::key(Key::Down),
                Segment::key(Key::Down),
                Segment::key(Key::Down),
                Segment::text("custom value"),
                Segment::key(Key::Enter),
            ]
        );
    }

    #[test]
    fn test_non_key_run_is_text() {
        assert_eq!(compile("`42`").unwrap(), vec![Segment::text("42")]);
        assert_eq!(compile("`y/n?`").unwrap(), vec![Segment::text("y/n?")]);
    }

    #[test]
    fn test_outside_text_never_becomes_keys() {
        assert_eq!(compile("dude").unwrap(), vec![Segment::text("dude")]);
        assert_eq!(compile("  Enter  ").unwrap(), vec![Segment::text("Enter")]);
    }

    #[test]
    fn test_mixed_run_fails() {
        match compile("`ddx`") {
            Err(DslError::MixedCharacter { run, key_chars, other_chars }) => {
                assert_eq!(run, "ddx");
                assert_eq!(key_chars, vec!['d']);
                assert_eq!(other_chars, vec!['x']);
            }
            other => panic!("expected mixed-character error, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_run_dedups_in_order() {
        match compile("ok `hello_e`") {
            Err(DslError::MixedCharacter { key_chars, other_chars, .. }) => {
                assert_eq!(key_chars, vec!['e', 'l']);
                assert_eq!(other_chars, vec!['h', 'o', '_']);
            }
            other => panic!("expected mixed-character error, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_backtick_is_parse_error() {
        assert_eq!(
            compile("abc `dd"),
            Err(DslError::Parse {
                position: 4,
                message: "unterminated backtick".into()
            })
        );
        assert!(matches!(compile("`"), Err(DslError::Parse { position: 0, .. })));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(compile("").unwrap().is_empty());
        assert!(compile("   ").unwrap().is_empty());
        assert!(compile("``").unwrap().is_empty());
        assert_eq!(compile("a``b").unwrap(), vec![Segment::text("a"), Segment::text("b")]);
    }

    #[test]
    fn test_adjacent_runs() {
        assert_eq!(
            compile("`dd``42``e`").unwrap(),
            vec![
                Segment::key(Key::Down),
                Segment::key(Key::Down),
                Segment::text("42"),
                Segment::key(Key::Enter),
            ]
        );
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(
            compile("héllo 🚀 `e`").unwrap(),
            vec![Segment::text("héllo 🚀"), Segment::key(Key::Enter)]
        );
    }
}
