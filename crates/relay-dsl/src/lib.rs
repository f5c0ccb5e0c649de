//! Key notation for tmux-relay.
//!
//! Users describe keystrokes with backtick runs mixed into plain text:
//!
//! ```text
//! `ddd` custom value `e`
//! ```
//!
//! compiles to Down, Down, Down, the text "custom value", then Enter.
//! Compilation is pure; executing the result is the runtime's job.

pub mod compiler;
pub mod error;

pub use compiler::compile;
pub use error::{DslError, Result};

/// Help text for the key notation.
pub fn user_guide() -> &'static str {
    "Key notation:\n\
     \n\
     Wrap key letters in backticks to press keys:\n\
     \x20 r = Right   l = Left   u = Up\n\
     \x20 d = Down    e = Enter  s = Space\n\
     \n\
     `ddd`              press Down three times\n\
     `e`                press Enter\n\
     `ddd` my answer `e` press Down x3, type \"my answer\", press Enter\n\
     \n\
     Text outside backticks is typed as-is. A backtick run with no key\n\
     letters (like `42`) is typed as-is too. A run mixing key letters with\n\
     other characters (like `ddx`) is rejected: split it into separate runs."
}
