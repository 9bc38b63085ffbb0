//! Open-node handle with scoped release.

use crate::error::StoreError;
use crate::store::{NodeMetadata, Parent, Store};
use crate::types::Depth;
use tracing::debug;

/// One open node of the store.
///
/// Opening never fails at the call site. A handle that could not be opened
/// is invalid: it answers the metadata accessors with zeros, keeps the
/// store's error code for the caller's policy decision, and releases
/// nothing. A valid handle owns its node id and releases it exactly once on
/// drop, so a handle crossing a scope boundary cannot leak the node.
pub struct NodeHandle<'s, S: Store> {
    store: &'s S,
    node: Option<S::NodeId>,
    name: String,
    depth: Depth,
    error: Option<StoreError>,
    meta: NodeMetadata,
}

impl<'s, S: Store> NodeHandle<'s, S> {
    /// Open `name` under `parent` at `depth`. Hive roots (an empty name
    /// under a hive anchor) take the hive label as their display name.
    ///
    /// The node's structural metadata is snapshotted here; a node whose
    /// metadata cannot be read is closed again and the handle comes back
    /// invalid.
    pub fn open(store: &'s S, parent: Parent<'_, S::NodeId>, name: &str, depth: Depth) -> Self {
        let display_name = match parent {
            Parent::Hive(hive) if name.is_empty() => hive.label().to_string(),
            _ => name.to_string(),
        };
        match store.open_node(parent, name) {
            Ok(id) => match store.metadata(&id) {
                Ok(meta) => Self {
                    store,
                    node: Some(id),
                    name: display_name,
                    depth,
                    error: None,
                    meta,
                },
                Err(err) => {
                    debug!(key = %display_name, depth, code = %err, "metadata query failed after open");
                    store.close_node(id);
                    Self {
                        store,
                        node: None,
                        name: display_name,
                        depth,
                        error: Some(err),
                        meta: NodeMetadata::default(),
                    }
                }
            },
            Err(err) => {
                if err != StoreError::NotFound {
                    debug!(key = %display_name, depth, code = %err, "open failed");
                }
                Self {
                    store,
                    node: None,
                    name: display_name,
                    depth,
                    error: Some(err),
                    meta: NodeMetadata::default(),
                }
            }
        }
    }

    /// Open `name` as a child of this node, one level deeper.
    pub fn open_child(&self, name: &str) -> NodeHandle<'s, S> {
        match self.node.as_ref() {
            Some(id) => NodeHandle::open(self.store, Parent::Key(id), name, self.depth + 1),
            None => Self {
                store: self.store,
                node: None,
                name: name.to_string(),
                depth: self.depth + 1,
                error: Some(StoreError::Other("parent node is not open".to_string())),
                meta: NodeMetadata::default(),
            },
        }
    }

    /// Whether the open succeeded and the handle is usable.
    pub fn is_valid(&self) -> bool {
        self.node.is_some()
    }

    /// Why the open failed, for invalid handles.
    pub fn open_error(&self) -> Option<&StoreError> {
        self.error.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> Depth {
        self.depth
    }

    /// Child count from the open-time snapshot.
    pub fn child_count(&self) -> u32 {
        self.meta.child_count
    }

    /// Value count from the open-time snapshot.
    pub fn value_count(&self) -> u32 {
        self.meta.value_count
    }

    /// Largest value payload, in bytes, from the open-time snapshot.
    pub fn longest_value_data(&self) -> u32 {
        self.meta.longest_value_data
    }

    fn id(&self) -> Result<&S::NodeId, StoreError> {
        self.node
            .as_ref()
            .ok_or_else(|| StoreError::Other("node is not open".to_string()))
    }

    pub fn child_name(&self, ordinal: u32) -> Result<String, StoreError> {
        self.store.child_name(self.id()?, ordinal)
    }

    pub fn value_name(&self, ordinal: u32) -> Result<String, StoreError> {
        self.store.value_name(self.id()?, ordinal)
    }

    pub fn string_value(&self, name: &str, limit: usize) -> Result<String, StoreError> {
        self.store.string_value(self.id()?, name, limit)
    }

    pub fn set_string_value(&self, name: &str, text: &str) -> Result<(), StoreError> {
        self.store.set_string_value(self.id()?, name, text)
    }
}

impl<S: Store> Drop for NodeHandle<'_, S> {
    fn drop(&mut self) {
        if let Some(id) = self.node.take() {
            self.store.close_node(id);
        }
    }
}
