//! `abtest`: drive the Autobahn test-suite backend from a terminal.
//!
//! Each subcommand opens one session, runs a single facade operation and
//! prints the outcome as a [`output::CommandResult`] envelope.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
