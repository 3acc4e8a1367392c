//! faascheck CLI library
//!
//! The binary in `main.rs` only parses arguments and dispatches here;
//! command handlers live in [`commands`] so that integration tests can
//! drive them directly.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod report;
