//! Compilation errors for key notation.

use thiserror::Error;

/// Why a notation string could not be compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DslError {
    /// A backtick run mixed key letters with other characters.
    #[error(
        "mixed characters in `{run}`: {} read as keys, {} are not keys",
        format_chars(.key_chars),
        format_chars(.other_chars)
    )]
    MixedCharacter {
        run: String,
        key_chars: Vec<char>,
        other_chars: Vec<char>,
    },

    /// The notation is malformed.
    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },
}

impl DslError {
    /// Remediation text suitable for showing to the user.
    pub fn user_guide(&self) -> String {
        match self {
            DslError::MixedCharacter { run, key_chars, other_chars } => format!(
                "The run `{run}` mixes key letters ({}) with other characters ({}).\n\
                 Put keys and text in separate runs, for example `{}` and `{}`.\n\n{}",
                format_chars(key_chars),
                format_chars(other_chars),
                key_chars.iter().collect::<String>(),
                other_chars.iter().collect::<String>(),
                crate::user_guide()
            ),
            DslError::Parse { .. } => format!(
                "Every opening backtick needs a closing backtick.\n\n{}",
                crate::user_guide()
            ),
        }
    }
}

fn format_chars(chars: &[char]) -> String {
    chars
        .iter()
        .map(|c| format!("'{}'", c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for notation compilation.
pub type Result<T> = std::result::Result<T, DslError>;
