//! Depth-first store traversal with in-place string rewriting.
//!
//! The walker visits every reachable node under a root handle, children
//! before values, and rewrites each string value the plan applies to.
//! Traversal state lives on an explicit frame stack rather than the call
//! stack, so depth is bounded by heap and the open handles are exactly the
//! frames: one per level, released as each subtree finishes.

use crate::error::{StoreError, WalkError};
use crate::rewrite::RewritePlan;
use crate::store::Store;
use crate::tree::NodeHandle;
use crate::types::MatchCount;
use tracing::{debug, info, trace, warn};

/// Extra bytes provisioned past the doubled longest-value size, covering
/// character-width accounting at the boundary.
const PROVISION_MARGIN: usize = 2;

/// Disposition of one enumerated child after an open attempt.
enum ChildStep<'s, S: Store> {
    /// The child opened; descend into it.
    Descend(NodeHandle<'s, S>),
    /// Benign open failure; continue with the next sibling.
    Skip,
}

/// Disposition of one enumerated value after a fetch attempt.
enum ValueStep {
    /// A string value, candidate for rewriting.
    Text(String),
    /// Not string-typed; leave it untouched.
    Skip,
}

/// One frame of traversal state: an open node plus the ordinal of the next
/// child to enumerate under it.
struct Frame<'s, S: Store> {
    node: NodeHandle<'s, S>,
    next_child: u32,
}

/// Walks one subtree and rewrites matching string values.
pub struct TreeWalker<'a> {
    plan: &'a RewritePlan,
}

impl<'a> TreeWalker<'a> {
    pub fn new(plan: &'a RewritePlan) -> Self {
        Self { plan }
    }

    /// Walk the subtree under `root`, incrementing `matches` once per
    /// rewritten value.
    ///
    /// Children are visited before the node's own values. A benign child
    /// failure skips that subtree; any error this returns abandons the walk
    /// with every handle released and every rewrite already applied left in
    /// place.
    pub fn walk<'s, S: Store>(
        &self,
        root: NodeHandle<'s, S>,
        matches: &mut MatchCount,
    ) -> Result<(), WalkError> {
        let mut stack: Vec<Frame<'s, S>> = vec![Frame {
            node: root,
            next_child: 0,
        }];
        // An early return drops the stack and with it every open handle.
        while self.advance(&mut stack, matches)? {}
        Ok(())
    }

    /// Run one step: enumerate the top frame's next child, or process its
    /// values and pop once the children are exhausted. Returns `false` when
    /// the stack is empty.
    fn advance<'s, S: Store>(
        &self,
        stack: &mut Vec<Frame<'s, S>>,
        matches: &mut MatchCount,
    ) -> Result<bool, WalkError> {
        let step = match stack.last_mut() {
            None => return Ok(false),
            Some(frame) => {
                if frame.next_child < frame.node.child_count() {
                    let ordinal = frame.next_child;
                    frame.next_child += 1;
                    let child = frame.node.child_name(ordinal).map_err(|source| {
                        WalkError::child_enumeration(frame.node.name(), ordinal, source)
                    })?;
                    Some(self.classify_child(
                        frame.node.open_child(&child),
                        frame.node.name(),
                        &child,
                    )?)
                } else {
                    self.rewrite_values(&frame.node, matches)?;
                    None
                }
            }
        };
        match step {
            Some(ChildStep::Descend(node)) => {
                debug!(key = %node.name(), depth = node.depth(), "descending");
                stack.push(Frame {
                    node,
                    next_child: 0,
                });
            }
            Some(ChildStep::Skip) => {}
            None => {
                stack.pop();
            }
        }
        Ok(!stack.is_empty())
    }

    /// Child-open policy: descend into valid children, skip the benign
    /// codes, abandon on anything else.
    ///
    /// Access-denied is benign here on purpose. Stores backed by a live
    /// registry fabricate access-denied entries during enumeration
    /// (virtualization artifacts) that do not correspond to openable nodes,
    /// and treating them as fatal would abandon otherwise healthy hives.
    /// Roots are opened by the sweep, not here, and stay fatal.
    fn classify_child<'s, S: Store>(
        &self,
        child: NodeHandle<'s, S>,
        parent: &str,
        name: &str,
    ) -> Result<ChildStep<'s, S>, WalkError> {
        if child.is_valid() {
            return Ok(ChildStep::Descend(child));
        }
        match child.open_error() {
            Some(StoreError::NotFound) => Ok(ChildStep::Skip),
            Some(StoreError::AccessDenied) => {
                debug!(key = %parent, child = %name, "skipping access-denied child");
                Ok(ChildStep::Skip)
            }
            Some(source) => Err(WalkError::child_open(parent, name, source.clone())),
            None => Err(WalkError::child_open(
                parent,
                name,
                StoreError::Other("open failed without a code".to_string()),
            )),
        }
    }

    /// Enumerate the values of `node` and rewrite the matching strings.
    ///
    /// The counter is incremented as soon as a match is found, before the
    /// write is attempted, so an aborted walk still accounts for the value
    /// that felled it.
    fn rewrite_values<S: Store>(
        &self,
        node: &NodeHandle<'_, S>,
        matches: &mut MatchCount,
    ) -> Result<(), WalkError> {
        if node.value_count() == 0 {
            return Ok(());
        }
        let limit = provisioned_limit(node.longest_value_data());
        for ordinal in 0..node.value_count() {
            let name = node.value_name(ordinal).map_err(|source| {
                WalkError::value_enumeration(node.name(), ordinal, source)
            })?;
            trace!(key = %node.name(), value = %name, "inspecting value");
            let text = match self.fetch_string(node, &name, limit)? {
                ValueStep::Text(text) => text,
                ValueStep::Skip => continue,
            };
            if !self.plan.applies_to(&text) {
                continue;
            }
            *matches += 1;
            let replaced = self.plan.rewrite(&text);
            info!(key = %node.name(), value = %name, "rewriting value");
            debug!(old = %text, new = %replaced, "rewrite detail");
            node.set_string_value(&name, &replaced)
                .map_err(|source| WalkError::value_write(node.name(), &name, source))?;
        }
        Ok(())
    }

    /// Value-fetch policy: hand back string payloads, skip non-string
    /// types, abandon on anything else.
    fn fetch_string<S: Store>(
        &self,
        node: &NodeHandle<'_, S>,
        name: &str,
        limit: usize,
    ) -> Result<ValueStep, WalkError> {
        match node.string_value(name, limit) {
            Ok(text) => Ok(ValueStep::Text(text)),
            Err(StoreError::UnsupportedType(kind)) => {
                trace!(key = %node.name(), value = %name, kind, "skipping non-string value");
                Ok(ValueStep::Skip)
            }
            Err(source) => {
                if let StoreError::InsufficientBuffer { needed, limit } = &source {
                    warn!(
                        key = %node.name(),
                        value = %name,
                        needed,
                        limit,
                        "value outgrew the provisioned buffer"
                    );
                }
                Err(WalkError::value_fetch(node.name(), name, source))
            }
        }
    }
}

/// Worst-case byte provision for a value fetch: the snapshot's largest
/// payload doubled, plus a margin. Doubling covers stores that report
/// character counts rather than byte counts for wide encodings.
fn provisioned_limit(longest_value_data: u32) -> usize {
    longest_value_data as usize * 2 + PROVISION_MARGIN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryStore, ValuePayload};
    use crate::store::{HiveRoot, Parent};

    const HIVE: HiveRoot = HiveRoot::CurrentUser;

    fn walk_hive(store: &MemoryStore) -> (Result<(), WalkError>, MatchCount) {
        let plan = RewritePlan::default();
        let walker = TreeWalker::new(&plan);
        let root = NodeHandle::open(store, Parent::Hive(HIVE), "", 0);
        let mut matches = 0;
        let result = walker.walk(root, &mut matches);
        (result, matches)
    }

    #[test]
    fn rewrites_matching_values_throughout_the_tree() {
        let store = MemoryStore::new();
        store.put_string(HIVE, "Software\\App", "InstallDir", "C:\\Users\\from\\app");
        store.put_string(HIVE, "Software\\App\\Deep", "Cache", "C:\\Users\\from\\cache");
        store.put_string(HIVE, "Software\\Other", "Home", "D:\\elsewhere");

        let (result, matches) = walk_hive(&store);
        assert!(result.is_ok());
        assert_eq!(matches, 2);
        assert_eq!(
            store.string_of(HIVE, "Software\\App", "InstallDir"),
            Some("C:\\Users\\to\\app".to_string())
        );
        assert_eq!(
            store.string_of(HIVE, "Software\\App\\Deep", "Cache"),
            Some("C:\\Users\\to\\cache".to_string())
        );
        assert_eq!(
            store.string_of(HIVE, "Software\\Other", "Home"),
            Some("D:\\elsewhere".to_string())
        );
    }

    #[test]
    fn rewrites_multiple_occurrences_in_one_value() {
        let store = MemoryStore::new();
        store.put_string(HIVE, "K", "Path", "C:\\Users\\from\\a;C:\\Users\\from\\b");
        let (result, matches) = walk_hive(&store);
        assert!(result.is_ok());
        assert_eq!(matches, 1);
        assert_eq!(
            store.string_of(HIVE, "K", "Path"),
            Some("C:\\Users\\to\\a;C:\\Users\\to\\b".to_string())
        );
    }

    #[test]
    fn non_string_values_are_left_untouched() {
        let store = MemoryStore::new();
        store.put_dword(HIVE, "K", "Flags", 7);
        store.put_binary(HIVE, "K", "Blob", b"Users\\from");
        store.put_expand_string(HIVE, "K", "Tmp", "C:\\Users\\from\\tmp");

        let (result, matches) = walk_hive(&store);
        assert!(result.is_ok());
        assert_eq!(matches, 0);
        assert_eq!(
            store.value_of(HIVE, "K", "Blob"),
            Some(ValuePayload::Binary(b"Users\\from".to_vec()))
        );
        assert_eq!(
            store.value_of(HIVE, "K", "Tmp"),
            Some(ValuePayload::ExpandSz("C:\\Users\\from\\tmp".to_string()))
        );
    }

    #[test]
    fn denied_subtree_is_skipped_not_fatal() {
        let store = MemoryStore::new();
        store.put_string(HIVE, "Locked\\Inner", "Path", "C:\\Users\\from\\hidden");
        store.deny_access(HIVE, "Locked");
        store.put_string(HIVE, "Open", "Path", "C:\\Users\\from\\seen");

        let (result, matches) = walk_hive(&store);
        assert!(result.is_ok());
        assert_eq!(matches, 1);
        assert_eq!(
            store.string_of(HIVE, "Locked\\Inner", "Path"),
            Some("C:\\Users\\from\\hidden".to_string())
        );
    }

    #[test]
    fn phantom_child_is_skipped_silently() {
        let store = MemoryStore::new();
        store.add_phantom_child(HIVE, "", "Ghost");
        store.put_string(HIVE, "Real", "Path", "C:\\Users\\from\\real");

        let (result, matches) = walk_hive(&store);
        assert!(result.is_ok());
        assert_eq!(matches, 1);
    }

    #[test]
    fn unexpected_child_open_error_abandons_the_walk() {
        let store = MemoryStore::new();
        store.fail_opens_with(HIVE, "Broken", StoreError::Other("io error".to_string()));

        let (result, _) = walk_hive(&store);
        match result {
            Err(WalkError::ChildOpen { key, child, source }) => {
                assert_eq!(key, "HKEY_CURRENT_USER");
                assert_eq!(child, "Broken");
                assert_eq!(source, StoreError::Other("io error".to_string()));
            }
            other => panic!("expected ChildOpen, got {other:?}"),
        }
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn child_enumeration_failure_abandons_the_walk() {
        let store = MemoryStore::new();
        store.add_key(HIVE, "K\\Only");
        store.force_child_count(HIVE, "K", 2);

        let (result, _) = walk_hive(&store);
        assert!(matches!(
            result,
            Err(WalkError::ChildEnumeration { ordinal: 1, .. })
        ));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn value_enumeration_failure_abandons_the_walk() {
        let store = MemoryStore::new();
        store.put_string(HIVE, "K", "Only", "x");
        store.force_value_count(HIVE, "K", 3);

        let (result, _) = walk_hive(&store);
        assert!(matches!(
            result,
            Err(WalkError::ValueEnumeration { ordinal: 1, .. })
        ));
    }

    #[test]
    fn oversized_value_abandons_the_walk() {
        let store = MemoryStore::new();
        store.put_string(HIVE, "K", "Long", &"C:\\Users\\from\\".repeat(8));
        store.clamp_longest_value_data(HIVE, "K", 4);

        let (result, matches) = walk_hive(&store);
        assert!(matches!(
            result,
            Err(WalkError::ValueFetch {
                source: StoreError::InsufficientBuffer { .. },
                ..
            })
        ));
        assert_eq!(matches, 0);
    }

    #[test]
    fn write_failure_abandons_after_counting_the_match() {
        let store = MemoryStore::new();
        store.put_string(HIVE, "K", "Path", "C:\\Users\\from\\x");
        store.fail_writes_with(HIVE, "K", StoreError::AccessDenied);

        let (result, matches) = walk_hive(&store);
        assert!(matches!(
            result,
            Err(WalkError::ValueWrite {
                source: StoreError::AccessDenied,
                ..
            })
        ));
        // Found before the write was refused, so it counts.
        assert_eq!(matches, 1);
        assert_eq!(
            store.string_of(HIVE, "K", "Path"),
            Some("C:\\Users\\from\\x".to_string())
        );
    }

    #[test]
    fn children_are_processed_before_the_parents_values() {
        let store = MemoryStore::new();
        store.put_string(HIVE, "", "RootPath", "C:\\Users\\from\\root");
        store.put_string(HIVE, "Child", "Path", "C:\\Users\\from\\child");
        store.fail_writes_with(HIVE, "Child", StoreError::AccessDenied);

        let (result, matches) = walk_hive(&store);
        // The child's write failed first, so the root's own value was never
        // reached.
        assert!(result.is_err());
        assert_eq!(matches, 1);
        assert_eq!(
            store.string_of(HIVE, "", "RootPath"),
            Some("C:\\Users\\from\\root".to_string())
        );
    }

    #[test]
    fn every_node_is_opened_exactly_once() {
        let store = MemoryStore::new();
        store.add_key(HIVE, "A\\B\\C");
        store.add_key(HIVE, "A\\D");
        store.add_key(HIVE, "E");

        let (result, _) = walk_hive(&store);
        assert!(result.is_ok());
        for path in ["", "A", "A\\B", "A\\B\\C", "A\\D", "E"] {
            assert_eq!(store.opens_of(HIVE, path), 1, "path {path:?}");
        }
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn open_handles_stay_one_per_depth_level() {
        let store = MemoryStore::new();
        // Depth 3 chain plus wide fanout at the top: the high-water mark
        // tracks depth, not breadth.
        store.add_key(HIVE, "A\\B\\C");
        for name in ["S1", "S2", "S3", "S4"] {
            store.add_key(HIVE, name);
        }

        let (result, _) = walk_hive(&store);
        assert!(result.is_ok());
        assert_eq!(store.open_high_water(), 4);
    }

    #[test]
    fn rewritten_tree_is_stable_on_a_second_walk() {
        let store = MemoryStore::new();
        store.put_string(HIVE, "K", "Path", "C:\\Users\\from\\x");

        let (_, first) = walk_hive(&store);
        assert_eq!(first, 1);
        let (result, second) = walk_hive(&store);
        assert!(result.is_ok());
        assert_eq!(second, 0);
        assert_eq!(
            store.string_of(HIVE, "K", "Path"),
            Some("C:\\Users\\to\\x".to_string())
        );
    }

    #[test]
    fn provision_covers_doubled_payload_plus_margin() {
        assert_eq!(provisioned_limit(0), 2);
        assert_eq!(provisioned_limit(10), 22);
    }
}
