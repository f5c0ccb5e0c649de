//! Operator CLI for tmux-relay.
//!
//! Exposes the engine's channel operations as subcommands so a chat bot (or
//! a person) can drive sessions from a shell.

pub mod cli;
pub mod commands;
