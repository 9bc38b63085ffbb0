//! Store capability interface
//!
//! The sweep consumes a registry-style hierarchical store through this
//! module: named nodes hanging off five well-known roots, named typed
//! values under each node, ordinal enumeration of both, and string-typed
//! get/set. Two backends ship here: an in-memory arena for tests and
//! ephemeral embedding, and a sled-backed store for durable data.

pub mod memory;
pub mod persistence;

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry-style value type codes, as reported by
/// [`StoreError::UnsupportedType`].
pub mod value_kind {
    pub const NONE: u32 = 0;
    pub const SZ: u32 = 1;
    pub const EXPAND_SZ: u32 = 2;
    pub const BINARY: u32 = 3;
    pub const DWORD: u32 = 4;
    pub const MULTI_SZ: u32 = 7;
    pub const QWORD: u32 = 11;
}

/// The five well-known root namespaces of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HiveRoot {
    #[serde(rename = "HKEY_CLASSES_ROOT")]
    ClassesRoot,
    #[serde(rename = "HKEY_CURRENT_USER")]
    CurrentUser,
    #[serde(rename = "HKEY_LOCAL_MACHINE")]
    LocalMachine,
    #[serde(rename = "HKEY_USERS")]
    Users,
    #[serde(rename = "HKEY_CURRENT_CONFIG")]
    CurrentConfig,
}

impl HiveRoot {
    /// Every root, in sweep order.
    pub const ALL: [HiveRoot; 5] = [
        HiveRoot::ClassesRoot,
        HiveRoot::CurrentUser,
        HiveRoot::LocalMachine,
        HiveRoot::Users,
        HiveRoot::CurrentConfig,
    ];

    /// Canonical display label.
    pub fn label(self) -> &'static str {
        match self {
            HiveRoot::ClassesRoot => "HKEY_CLASSES_ROOT",
            HiveRoot::CurrentUser => "HKEY_CURRENT_USER",
            HiveRoot::LocalMachine => "HKEY_LOCAL_MACHINE",
            HiveRoot::Users => "HKEY_USERS",
            HiveRoot::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Short name used for per-hive storage partitions.
    pub(crate) fn partition(self) -> &'static str {
        match self {
            HiveRoot::ClassesRoot => "classes_root",
            HiveRoot::CurrentUser => "current_user",
            HiveRoot::LocalMachine => "local_machine",
            HiveRoot::Users => "users",
            HiveRoot::CurrentConfig => "current_config",
        }
    }
}

impl fmt::Display for HiveRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Anchor a node open resolves against.
#[derive(Debug, Clone, Copy)]
pub enum Parent<'a, I> {
    /// One of the five root namespaces. An empty relative name opens the
    /// root node itself.
    Hive(HiveRoot),
    /// An already-open node.
    Key(&'a I),
}

/// Structural snapshot of a node, taken at open time.
///
/// Counts and lengths describe the node as it was when opened; a store
/// mutated afterwards may disagree with the snapshot, which is why
/// enumeration and fetch report their own errors instead of trusting it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    pub child_count: u32,
    /// Length in characters of the longest child name.
    pub longest_child_name: u32,
    pub value_count: u32,
    /// Length in characters of the longest value name.
    pub longest_value_name: u32,
    /// Size in bytes of the largest value payload under the node.
    pub longest_value_data: u32,
}

/// Capability surface of a hierarchical key-value store.
///
/// Every operation takes `&self`; implementations handle their own interior
/// mutability. A successful [`open_node`](Store::open_node) hands out a node
/// id the caller must pass to [`close_node`](Store::close_node) exactly
/// once, a contract [`NodeHandle`](crate::tree::NodeHandle) enforces with
/// its `Drop`.
pub trait Store {
    /// Identifier of an open node.
    type NodeId: fmt::Debug;

    /// Open `name` under `parent`. An empty `name` under a hive anchor
    /// opens the hive root; under a key anchor it reopens that key.
    fn open_node(
        &self,
        parent: Parent<'_, Self::NodeId>,
        name: &str,
    ) -> Result<Self::NodeId, StoreError>;

    /// Snapshot the structural metadata of an open node.
    fn metadata(&self, node: &Self::NodeId) -> Result<NodeMetadata, StoreError>;

    /// Name of the child at `ordinal` (0-based).
    fn child_name(&self, node: &Self::NodeId, ordinal: u32) -> Result<String, StoreError>;

    /// Name of the value at `ordinal` (0-based).
    fn value_name(&self, node: &Self::NodeId, ordinal: u32) -> Result<String, StoreError>;

    /// Fetch a string-typed value. `limit` caps the accepted payload size
    /// in bytes; larger payloads report [`StoreError::InsufficientBuffer`]
    /// and non-string values report [`StoreError::UnsupportedType`].
    fn string_value(
        &self,
        node: &Self::NodeId,
        name: &str,
        limit: usize,
    ) -> Result<String, StoreError>;

    /// Write a string-typed value under `name`, replacing any existing
    /// value of any type.
    fn set_string_value(&self, node: &Self::NodeId, name: &str, text: &str)
        -> Result<(), StoreError>;

    /// Release an open node. Called exactly once per successful open.
    fn close_node(&self, node: Self::NodeId);
}
