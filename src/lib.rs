//! Rehome: stale home-directory path rewriting
//!
//! Walks every root hive of a registry-style hierarchical key-value store
//! depth-first and rewrites string values that still mention the old
//! home-directory location, counting each rewritten value. The store is
//! pluggable behind [`store::Store`]; a sled-backed store and an in-memory
//! store ship with the crate.

pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod rewrite;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;
