//! Compiled keystroke segments.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named key the relay can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Space,
}

impl Key {
    /// Maps a key-notation character to its key (case-insensitive).
    ///
    /// `r`, `l`, `u`, `d`, `e`, `s` map to Right, Left, Up, Down, Enter, Space.
    pub fn from_notation(c: char) -> Option<Key> {
        match c.to_ascii_lowercase() {
            'r' => Some(Key::Right),
            'l' => Some(Key::Left),
            'u' => Some(Key::Up),
            'd' => Some(Key::Down),
            'e' => Some(Key::Enter),
            's' => Some(Key::Space),
            _ => None,
        }
    }

    /// The key name tmux understands.
    pub fn tmux_name(&self) -> &'static str {
        match self {
            Key::Up => "Up",
            Key::Down => "Down",
            Key::Left => "Left",
            Key::Right => "Right",
            Key::Enter => "Enter",
            Key::Space => "Space",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tmux_name())
    }
}

/// One step of a compiled input sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Press a named key.
    Key { key: Key },
    /// Type literal text.
    Text { content: String },
}

impl Segment {
    /// Shorthand for a key segment.
    pub fn key(key: Key) -> Self {
        Segment::Key { key }
    }

    /// Shorthand for a text segment.
    pub fn text(content: impl Into<String>) -> Self {
        Segment::Text {
            content: content.into(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key { key } => write!(f, "[{}]", key),
            Segment::Text { content } => write!(f, "{:?}", content),
        }
    }
}
