//! Tooling & Integration Layer
//!
//! Command-line entry points for the sweep.

pub mod cli;

pub use cli::{Cli, CliContext};
