//! In-memory store backend.
//!
//! An arena-backed tree with the five hive roots pre-created. Used by tests
//! and ephemeral embedders. Besides the plain builder methods it carries
//! fault knobs for the conditions a live registry produces: nodes that
//! refuse to open, phantom children that enumerate but no longer exist, and
//! metadata snapshots that disagree with the data behind them.

use crate::error::StoreError;
use crate::store::{value_kind, HiveRoot, NodeMetadata, Parent, Store};
use parking_lot::RwLock;

/// A value payload with its registry-style type.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePayload {
    Sz(String),
    ExpandSz(String),
    Dword(u32),
    Qword(u64),
    Binary(Vec<u8>),
}

impl ValuePayload {
    pub fn kind(&self) -> u32 {
        match self {
            ValuePayload::Sz(_) => value_kind::SZ,
            ValuePayload::ExpandSz(_) => value_kind::EXPAND_SZ,
            ValuePayload::Dword(_) => value_kind::DWORD,
            ValuePayload::Qword(_) => value_kind::QWORD,
            ValuePayload::Binary(_) => value_kind::BINARY,
        }
    }

    /// Stored size in bytes, as surfaced through node metadata.
    fn data_len(&self) -> usize {
        match self {
            ValuePayload::Sz(s) | ValuePayload::ExpandSz(s) => s.len(),
            ValuePayload::Dword(_) => 4,
            ValuePayload::Qword(_) => 8,
            ValuePayload::Binary(b) => b.len(),
        }
    }
}

#[derive(Debug, Clone)]
struct ValueEntry {
    name: String,
    payload: ValuePayload,
}

#[derive(Debug, Clone)]
struct ChildEntry {
    name: String,
    /// Arena index. `None` marks a phantom that enumerates but reports
    /// not-found when opened.
    node: Option<usize>,
}

#[derive(Debug, Default)]
struct Node {
    children: Vec<ChildEntry>,
    values: Vec<ValueEntry>,
    /// Error every open of this node reports.
    open_fault: Option<StoreError>,
    /// Error every value write under this node reports.
    write_fault: Option<StoreError>,
    /// Caps the `longest_value_data` this node's metadata reports.
    longest_data_clamp: Option<u32>,
    /// Overrides the `child_count` this node's metadata reports.
    child_count_override: Option<u32>,
    /// Overrides the `value_count` this node's metadata reports.
    value_count_override: Option<u32>,
    /// Successful opens since creation.
    opens: u32,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<Node>,
    open_now: u32,
    open_high_water: u32,
}

/// In-memory [`Store`] with the five hive roots pre-created.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for _ in HiveRoot::ALL {
            inner.nodes.push(Node::default());
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Create `path` under `hive`, including missing intermediate keys.
    /// Segments are separated by `\`; an empty path names the root itself.
    pub fn add_key(&self, hive: HiveRoot, path: &str) {
        let mut inner = self.inner.write();
        ensure_path(&mut inner, hive, path);
    }

    pub fn put_string(&self, hive: HiveRoot, path: &str, name: &str, text: &str) {
        self.put_value(hive, path, name, ValuePayload::Sz(text.to_string()));
    }

    pub fn put_expand_string(&self, hive: HiveRoot, path: &str, name: &str, text: &str) {
        self.put_value(hive, path, name, ValuePayload::ExpandSz(text.to_string()));
    }

    pub fn put_dword(&self, hive: HiveRoot, path: &str, name: &str, value: u32) {
        self.put_value(hive, path, name, ValuePayload::Dword(value));
    }

    pub fn put_qword(&self, hive: HiveRoot, path: &str, name: &str, value: u64) {
        self.put_value(hive, path, name, ValuePayload::Qword(value));
    }

    pub fn put_binary(&self, hive: HiveRoot, path: &str, name: &str, bytes: &[u8]) {
        self.put_value(hive, path, name, ValuePayload::Binary(bytes.to_vec()));
    }

    /// Set or replace a value, creating the key path if needed.
    pub fn put_value(&self, hive: HiveRoot, path: &str, name: &str, payload: ValuePayload) {
        let mut inner = self.inner.write();
        let idx = ensure_path(&mut inner, hive, path);
        let node = &mut inner.nodes[idx];
        match node.values.iter_mut().find(|v| v.name == name) {
            Some(entry) => entry.payload = payload,
            None => node.values.push(ValueEntry {
                name: name.to_string(),
                payload,
            }),
        }
    }

    /// Add a child entry that enumerates under `path` but opens as
    /// not-found. Models keys deleted between enumeration and open.
    pub fn add_phantom_child(&self, hive: HiveRoot, path: &str, child: &str) {
        let mut inner = self.inner.write();
        let idx = ensure_path(&mut inner, hive, path);
        inner.nodes[idx].children.push(ChildEntry {
            name: child.to_string(),
            node: None,
        });
    }

    /// Make every open of `path` report access-denied. Models the
    /// pseudo-entries registry virtualization fabricates.
    pub fn deny_access(&self, hive: HiveRoot, path: &str) {
        self.fail_opens_with(hive, path, StoreError::AccessDenied);
    }

    /// Make every open of `path` report `err`.
    pub fn fail_opens_with(&self, hive: HiveRoot, path: &str, err: StoreError) {
        let mut inner = self.inner.write();
        let idx = ensure_path(&mut inner, hive, path);
        inner.nodes[idx].open_fault = Some(err);
    }

    /// Make every value write under `path` report `err`.
    pub fn fail_writes_with(&self, hive: HiveRoot, path: &str, err: StoreError) {
        let mut inner = self.inner.write();
        let idx = ensure_path(&mut inner, hive, path);
        inner.nodes[idx].write_fault = Some(err);
    }

    /// Cap the `longest_value_data` reported for `path`, regardless of the
    /// values actually stored there. Models a stale metadata snapshot.
    pub fn clamp_longest_value_data(&self, hive: HiveRoot, path: &str, bytes: u32) {
        let mut inner = self.inner.write();
        let idx = ensure_path(&mut inner, hive, path);
        inner.nodes[idx].longest_data_clamp = Some(bytes);
    }

    /// Force the `child_count` reported for `path`. Counts past the real
    /// child list make enumeration fail at the excess ordinals.
    pub fn force_child_count(&self, hive: HiveRoot, path: &str, count: u32) {
        let mut inner = self.inner.write();
        let idx = ensure_path(&mut inner, hive, path);
        inner.nodes[idx].child_count_override = Some(count);
    }

    /// Force the `value_count` reported for `path`.
    pub fn force_value_count(&self, hive: HiveRoot, path: &str, count: u32) {
        let mut inner = self.inner.write();
        let idx = ensure_path(&mut inner, hive, path);
        inner.nodes[idx].value_count_override = Some(count);
    }

    /// Nodes currently open.
    pub fn open_handles(&self) -> u32 {
        self.inner.read().open_now
    }

    /// Most nodes ever open at the same time.
    pub fn open_high_water(&self) -> u32 {
        self.inner.read().open_high_water
    }

    /// Successful opens of the node at `path` since creation.
    pub fn opens_of(&self, hive: HiveRoot, path: &str) -> u32 {
        let inner = self.inner.read();
        locate(&inner, hive, path).map_or(0, |idx| inner.nodes[idx].opens)
    }

    /// Current payload of a value, read directly.
    pub fn value_of(&self, hive: HiveRoot, path: &str, name: &str) -> Option<ValuePayload> {
        let inner = self.inner.read();
        let idx = locate(&inner, hive, path)?;
        inner.nodes[idx]
            .values
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.payload.clone())
    }

    /// Current text of a string value, read directly.
    pub fn string_of(&self, hive: HiveRoot, path: &str, name: &str) -> Option<String> {
        match self.value_of(hive, path, name) {
            Some(ValuePayload::Sz(s)) => Some(s),
            _ => None,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('\\').filter(|s| !s.is_empty())
}

/// Arena index of `path`, following only real (non-phantom) children.
fn locate(inner: &Inner, hive: HiveRoot, path: &str) -> Option<usize> {
    let mut idx = hive as usize;
    for segment in segments(path) {
        idx = inner.nodes[idx]
            .children
            .iter()
            .find(|c| c.name == segment)
            .and_then(|c| c.node)?;
    }
    Some(idx)
}

/// Arena index of `path`, creating missing keys along the way.
fn ensure_path(inner: &mut Inner, hive: HiveRoot, path: &str) -> usize {
    let mut idx = hive as usize;
    for segment in segments(path) {
        let existing = inner.nodes[idx]
            .children
            .iter()
            .find(|c| c.name == segment)
            .and_then(|c| c.node);
        idx = match existing {
            Some(child) => child,
            None => {
                let child = inner.nodes.len();
                inner.nodes.push(Node::default());
                inner.nodes[idx].children.push(ChildEntry {
                    name: segment.to_string(),
                    node: Some(child),
                });
                child
            }
        };
    }
    idx
}

fn child_index(inner: &Inner, parent: usize, name: &str) -> Result<usize, StoreError> {
    match inner.nodes[parent].children.iter().find(|c| c.name == name) {
        Some(ChildEntry {
            node: Some(idx), ..
        }) => Ok(*idx),
        // Phantom entries and absent names both read as not-found.
        Some(_) | None => Err(StoreError::NotFound),
    }
}

impl Store for MemoryStore {
    type NodeId = usize;

    fn open_node(
        &self,
        parent: Parent<'_, Self::NodeId>,
        name: &str,
    ) -> Result<Self::NodeId, StoreError> {
        let mut inner = self.inner.write();
        let target = match parent {
            Parent::Hive(hive) => {
                let root = hive as usize;
                if name.is_empty() {
                    root
                } else {
                    child_index(&inner, root, name)?
                }
            }
            Parent::Key(id) => {
                if inner.nodes.get(*id).is_none() {
                    return Err(StoreError::Other("parent node is not open".to_string()));
                }
                if name.is_empty() {
                    *id
                } else {
                    child_index(&inner, *id, name)?
                }
            }
        };
        if let Some(fault) = &inner.nodes[target].open_fault {
            return Err(fault.clone());
        }
        inner.nodes[target].opens += 1;
        inner.open_now += 1;
        inner.open_high_water = inner.open_high_water.max(inner.open_now);
        Ok(target)
    }

    fn metadata(&self, node: &Self::NodeId) -> Result<NodeMetadata, StoreError> {
        let inner = self.inner.read();
        let n = inner
            .nodes
            .get(*node)
            .ok_or_else(|| StoreError::Other("node is not open".to_string()))?;
        let longest_data = n
            .values
            .iter()
            .map(|v| v.payload.data_len() as u32)
            .max()
            .unwrap_or(0);
        Ok(NodeMetadata {
            child_count: n.child_count_override.unwrap_or(n.children.len() as u32),
            longest_child_name: n
                .children
                .iter()
                .map(|c| c.name.chars().count() as u32)
                .max()
                .unwrap_or(0),
            value_count: n.value_count_override.unwrap_or(n.values.len() as u32),
            longest_value_name: n
                .values
                .iter()
                .map(|v| v.name.chars().count() as u32)
                .max()
                .unwrap_or(0),
            longest_value_data: match n.longest_data_clamp {
                Some(clamp) => longest_data.min(clamp),
                None => longest_data,
            },
        })
    }

    fn child_name(&self, node: &Self::NodeId, ordinal: u32) -> Result<String, StoreError> {
        let inner = self.inner.read();
        let n = inner
            .nodes
            .get(*node)
            .ok_or_else(|| StoreError::Other("node is not open".to_string()))?;
        n.children
            .get(ordinal as usize)
            .map(|c| c.name.clone())
            .ok_or_else(|| StoreError::Other("no more items".to_string()))
    }

    fn value_name(&self, node: &Self::NodeId, ordinal: u32) -> Result<String, StoreError> {
        let inner = self.inner.read();
        let n = inner
            .nodes
            .get(*node)
            .ok_or_else(|| StoreError::Other("node is not open".to_string()))?;
        n.values
            .get(ordinal as usize)
            .map(|v| v.name.clone())
            .ok_or_else(|| StoreError::Other("no more items".to_string()))
    }

    fn string_value(
        &self,
        node: &Self::NodeId,
        name: &str,
        limit: usize,
    ) -> Result<String, StoreError> {
        let inner = self.inner.read();
        let n = inner
            .nodes
            .get(*node)
            .ok_or_else(|| StoreError::Other("node is not open".to_string()))?;
        let entry = n
            .values
            .iter()
            .find(|v| v.name == name)
            .ok_or(StoreError::NotFound)?;
        match &entry.payload {
            ValuePayload::Sz(text) => {
                let needed = text.len();
                if needed > limit {
                    Err(StoreError::InsufficientBuffer { needed, limit })
                } else {
                    Ok(text.clone())
                }
            }
            other => Err(StoreError::UnsupportedType(other.kind())),
        }
    }

    fn set_string_value(
        &self,
        node: &Self::NodeId,
        name: &str,
        text: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let n = inner
            .nodes
            .get_mut(*node)
            .ok_or_else(|| StoreError::Other("node is not open".to_string()))?;
        if let Some(fault) = &n.write_fault {
            return Err(fault.clone());
        }
        match n.values.iter_mut().find(|v| v.name == name) {
            Some(entry) => entry.payload = ValuePayload::Sz(text.to_string()),
            None => n.values.push(ValueEntry {
                name: name.to_string(),
                payload: ValuePayload::Sz(text.to_string()),
            }),
        }
        Ok(())
    }

    fn close_node(&self, _node: Self::NodeId) {
        let mut inner = self.inner.write();
        inner.open_now = inner.open_now.saturating_sub(1);
    }
}
