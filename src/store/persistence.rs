//! Sled-backed store.
//!
//! Each hive root maps to one sled tree. Inside a tree, three record kinds
//! share the keyspace, distinguished by a one-byte tag and NUL-separated
//! fields (names must not contain NUL):
//!
//! - `k\0<path>`           key marker, empty payload
//! - `c\0<parent>\0<name>` child marker under `<parent>`, empty payload
//! - `v\0<path>\0<name>`   value record, bincode-encoded [`StoredValue`]
//!
//! Hive roots exist implicitly as the empty path. Opening a node snapshots
//! its child and value names for ordinal enumeration; fetches and writes go
//! straight to sled, so a value written after the snapshot is readable even
//! though it does not enumerate.

use crate::error::StoreError;
use crate::store::{value_kind, HiveRoot, NodeMetadata, Parent, Store};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const KEY_TAG: u8 = b'k';
const CHILD_TAG: u8 = b'c';
const VALUE_TAG: u8 = b'v';
const SEP: u8 = 0;

/// One stored value: its registry-style type code and raw payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    kind: u32,
    data: Vec<u8>,
}

/// Snapshot taken when a node is opened.
#[derive(Debug)]
struct OpenNode {
    hive: HiveRoot,
    path: String,
    children: Vec<String>,
    values: Vec<String>,
    longest_value_data: u32,
}

#[derive(Debug, Default)]
struct OpenTable {
    next: u64,
    nodes: HashMap<u64, OpenNode>,
}

/// Durable [`Store`] with one sled tree per hive.
pub struct SledStore {
    db: sled::Db,
    trees: Vec<sled::Tree>,
    open: RwLock<OpenTable>,
}

impl SledStore {
    /// Open or create a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(StoreError::backend)?;
        Self::from_db(db)
    }

    /// Wrap an already-open sled database.
    pub fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let mut trees = Vec::with_capacity(HiveRoot::ALL.len());
        for hive in HiveRoot::ALL {
            trees.push(db.open_tree(hive.partition()).map_err(StoreError::backend)?);
        }
        Ok(Self {
            db,
            trees,
            open: RwLock::new(OpenTable::default()),
        })
    }

    /// Flush dirty data to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(StoreError::backend)?;
        Ok(())
    }

    fn tree(&self, hive: HiveRoot) -> &sled::Tree {
        &self.trees[hive as usize]
    }

    /// Create `path` and every missing key above it.
    pub fn create_key(&self, hive: HiveRoot, path: &str) -> Result<(), StoreError> {
        let tree = self.tree(hive);
        let mut parent = String::new();
        for segment in path.split('\\').filter(|s| !s.is_empty()) {
            let full = join_path(&parent, segment);
            tree.insert(key_marker(&full), "").map_err(StoreError::backend)?;
            tree.insert(child_marker(&parent, segment), "")
                .map_err(StoreError::backend)?;
            parent = full;
        }
        Ok(())
    }

    /// Set a value with an explicit type code, creating the key if needed.
    pub fn put_value(
        &self,
        hive: HiveRoot,
        path: &str,
        name: &str,
        kind: u32,
        data: Vec<u8>,
    ) -> Result<(), StoreError> {
        self.create_key(hive, path)?;
        let record = bincode::serialize(&StoredValue { kind, data }).map_err(StoreError::backend)?;
        self.tree(hive)
            .insert(value_record(path, name), record)
            .map_err(StoreError::backend)?;
        Ok(())
    }

    pub fn put_string(
        &self,
        hive: HiveRoot,
        path: &str,
        name: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        self.put_value(hive, path, name, value_kind::SZ, text.as_bytes().to_vec())
    }

    pub fn put_expand_string(
        &self,
        hive: HiveRoot,
        path: &str,
        name: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        self.put_value(
            hive,
            path,
            name,
            value_kind::EXPAND_SZ,
            text.as_bytes().to_vec(),
        )
    }

    pub fn put_dword(
        &self,
        hive: HiveRoot,
        path: &str,
        name: &str,
        value: u32,
    ) -> Result<(), StoreError> {
        self.put_value(
            hive,
            path,
            name,
            value_kind::DWORD,
            value.to_le_bytes().to_vec(),
        )
    }

    pub fn put_binary(
        &self,
        hive: HiveRoot,
        path: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        self.put_value(hive, path, name, value_kind::BINARY, bytes.to_vec())
    }

    fn snapshot(&self, hive: HiveRoot, path: &str) -> Result<OpenNode, StoreError> {
        let tree = self.tree(hive);
        if !path.is_empty() {
            let exists = tree
                .contains_key(key_marker(path))
                .map_err(StoreError::backend)?;
            if !exists {
                return Err(StoreError::NotFound);
            }
        }

        let children_under = child_prefix(path);
        let mut children = Vec::new();
        for entry in tree.scan_prefix(&children_under) {
            let (key, _) = entry.map_err(StoreError::backend)?;
            children.push(field_after_prefix(&key, children_under.len())?);
        }

        let values_under = value_prefix(path);
        let mut values = Vec::new();
        let mut longest_value_data = 0u32;
        for entry in tree.scan_prefix(&values_under) {
            let (key, payload) = entry.map_err(StoreError::backend)?;
            values.push(field_after_prefix(&key, values_under.len())?);
            let record: StoredValue =
                bincode::deserialize(&payload).map_err(StoreError::backend)?;
            longest_value_data = longest_value_data.max(record.data.len() as u32);
        }

        Ok(OpenNode {
            hive,
            path: path.to_string(),
            children,
            values,
            longest_value_data,
        })
    }

    fn with_open<T>(
        &self,
        id: &u64,
        f: impl FnOnce(&OpenNode) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let table = self.open.read();
        let node = table
            .nodes
            .get(id)
            .ok_or_else(|| StoreError::Other("node is not open".to_string()))?;
        f(node)
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if name.is_empty() {
        parent.to_string()
    } else if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}\\{name}")
    }
}

fn key_marker(path: &str) -> Vec<u8> {
    let mut key = vec![KEY_TAG, SEP];
    key.extend_from_slice(path.as_bytes());
    key
}

fn child_marker(parent: &str, name: &str) -> Vec<u8> {
    let mut key = child_prefix(parent);
    key.extend_from_slice(name.as_bytes());
    key
}

fn child_prefix(parent: &str) -> Vec<u8> {
    let mut key = vec![CHILD_TAG, SEP];
    key.extend_from_slice(parent.as_bytes());
    key.push(SEP);
    key
}

fn value_record(path: &str, name: &str) -> Vec<u8> {
    let mut key = value_prefix(path);
    key.extend_from_slice(name.as_bytes());
    key
}

fn value_prefix(path: &str) -> Vec<u8> {
    let mut key = vec![VALUE_TAG, SEP];
    key.extend_from_slice(path.as_bytes());
    key.push(SEP);
    key
}

fn field_after_prefix(key: &[u8], prefix_len: usize) -> Result<String, StoreError> {
    let raw = key
        .get(prefix_len..)
        .ok_or_else(|| StoreError::Other("malformed store key".to_string()))?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| StoreError::Other("store key is not valid UTF-8".to_string()))
}

impl Store for SledStore {
    type NodeId = u64;

    fn open_node(
        &self,
        parent: Parent<'_, Self::NodeId>,
        name: &str,
    ) -> Result<Self::NodeId, StoreError> {
        let (hive, path) = match parent {
            Parent::Hive(hive) => (hive, name.to_string()),
            Parent::Key(id) => self.with_open(id, |node| {
                Ok((node.hive, join_path(&node.path, name)))
            })?,
        };
        let snapshot = self.snapshot(hive, &path)?;
        let mut table = self.open.write();
        let id = table.next;
        table.next += 1;
        table.nodes.insert(id, snapshot);
        Ok(id)
    }

    fn metadata(&self, node: &Self::NodeId) -> Result<NodeMetadata, StoreError> {
        self.with_open(node, |open| {
            Ok(NodeMetadata {
                child_count: open.children.len() as u32,
                longest_child_name: open
                    .children
                    .iter()
                    .map(|c| c.chars().count() as u32)
                    .max()
                    .unwrap_or(0),
                value_count: open.values.len() as u32,
                longest_value_name: open
                    .values
                    .iter()
                    .map(|v| v.chars().count() as u32)
                    .max()
                    .unwrap_or(0),
                longest_value_data: open.longest_value_data,
            })
        })
    }

    fn child_name(&self, node: &Self::NodeId, ordinal: u32) -> Result<String, StoreError> {
        self.with_open(node, |open| {
            open.children
                .get(ordinal as usize)
                .cloned()
                .ok_or_else(|| StoreError::Other("no more items".to_string()))
        })
    }

    fn value_name(&self, node: &Self::NodeId, ordinal: u32) -> Result<String, StoreError> {
        self.with_open(node, |open| {
            open.values
                .get(ordinal as usize)
                .cloned()
                .ok_or_else(|| StoreError::Other("no more items".to_string()))
        })
    }

    fn string_value(
        &self,
        node: &Self::NodeId,
        name: &str,
        limit: usize,
    ) -> Result<String, StoreError> {
        let (hive, path) = self.with_open(node, |open| Ok((open.hive, open.path.clone())))?;
        let payload = self
            .tree(hive)
            .get(value_record(&path, name))
            .map_err(StoreError::backend)?
            .ok_or(StoreError::NotFound)?;
        let record: StoredValue = bincode::deserialize(&payload).map_err(StoreError::backend)?;
        if record.kind != value_kind::SZ {
            return Err(StoreError::UnsupportedType(record.kind));
        }
        if record.data.len() > limit {
            return Err(StoreError::InsufficientBuffer {
                needed: record.data.len(),
                limit,
            });
        }
        String::from_utf8(record.data)
            .map_err(|_| StoreError::Other("string value is not valid UTF-8".to_string()))
    }

    fn set_string_value(
        &self,
        node: &Self::NodeId,
        name: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let (hive, path) = self.with_open(node, |open| Ok((open.hive, open.path.clone())))?;
        let record = bincode::serialize(&StoredValue {
            kind: value_kind::SZ,
            data: text.as_bytes().to_vec(),
        })
        .map_err(StoreError::backend)?;
        self.tree(hive)
            .insert(value_record(&path, name), record)
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn close_node(&self, node: Self::NodeId) {
        self.open.write().nodes.remove(&node);
    }
}
