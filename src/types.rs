//! Core types for the hive sweep.

/// MatchCount: number of values rewritten, accumulated across every hive
pub type MatchCount = u64;

/// Depth: distance of an open node from its hive root
pub type Depth = u32;
