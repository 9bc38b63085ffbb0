//! Five-hive sweep: the traversal entry point.

use crate::error::{RootOpenError, StoreError};
use crate::report::{HiveOutcome, SweepReport};
use crate::rewrite::RewritePlan;
use crate::store::{HiveRoot, Parent, Store};
use crate::tree::{NodeHandle, TreeWalker};
use crate::types::MatchCount;
use tracing::{error, info};

/// Runs the rewrite across every hive root with one shared counter.
pub struct HiveSweep<'a, S: Store> {
    store: &'a S,
    plan: &'a RewritePlan,
}

impl<'a, S: Store> HiveSweep<'a, S> {
    pub fn new(store: &'a S, plan: &'a RewritePlan) -> Self {
        Self { store, plan }
    }

    /// Open each root in [`HiveRoot::ALL`] order and walk it.
    ///
    /// A root that will not open ends the run immediately: earlier hives
    /// have already been swept and their rewrites stay, but no further hive
    /// is attempted. A walk failure is softer, it abandons that hive alone
    /// and the sweep moves on to the next root.
    pub fn run(&self) -> Result<SweepReport, RootOpenError> {
        let mut matches: MatchCount = 0;
        let walker = TreeWalker::new(self.plan);
        let mut hives = Vec::with_capacity(HiveRoot::ALL.len());
        for hive in HiveRoot::ALL {
            let root = NodeHandle::open(self.store, Parent::Hive(hive), "", 0);
            if !root.is_valid() {
                let source = root.open_error().cloned().unwrap_or_else(|| {
                    StoreError::Other("open failed without a code".to_string())
                });
                error!(%hive, code = %source, "hive root failed to open");
                return Err(RootOpenError { hive, source });
            }
            info!(%hive, "sweeping hive");
            let before = matches;
            match walker.walk(root, &mut matches) {
                Ok(()) => {
                    info!(%hive, matches = matches - before, "hive swept");
                    hives.push(HiveOutcome::completed(hive, matches - before));
                }
                Err(err) => {
                    error!(%hive, %err, "abandoning hive");
                    hives.push(HiveOutcome::abandoned(hive, matches - before, &err));
                }
            }
        }
        info!(matches, "sweep finished");
        Ok(SweepReport { matches, hives })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::HiveStatus;
    use crate::store::memory::MemoryStore;

    fn sweep(store: &MemoryStore) -> Result<SweepReport, RootOpenError> {
        let plan = RewritePlan::default();
        HiveSweep::new(store, &plan).run()
    }

    #[test]
    fn empty_store_completes_with_zero_matches() {
        let store = MemoryStore::new();
        let report = sweep(&store).unwrap();
        assert_eq!(report.matches, 0);
        assert_eq!(report.hives.len(), 5);
        assert!(report.fully_completed());
    }

    #[test]
    fn counter_accumulates_across_hives() {
        let store = MemoryStore::new();
        store.put_string(HiveRoot::ClassesRoot, "K", "A", "C:\\Users\\from\\1");
        store.put_string(HiveRoot::Users, "K", "B", "C:\\Users\\from\\2");
        store.put_string(HiveRoot::Users, "K", "C", "C:\\Users\\from\\3");

        let report = sweep(&store).unwrap();
        assert_eq!(report.matches, 3);
        let per_hive: Vec<u64> = report.hives.iter().map(|h| h.matches).collect();
        assert_eq!(per_hive, vec![1, 0, 0, 2, 0]);
    }

    #[test]
    fn hive_order_is_fixed() {
        let store = MemoryStore::new();
        let report = sweep(&store).unwrap();
        let labels: Vec<&str> = report.hives.iter().map(|h| h.hive.label()).collect();
        assert_eq!(
            labels,
            vec![
                "HKEY_CLASSES_ROOT",
                "HKEY_CURRENT_USER",
                "HKEY_LOCAL_MACHINE",
                "HKEY_USERS",
                "HKEY_CURRENT_CONFIG",
            ]
        );
    }

    #[test]
    fn root_open_failure_stops_the_run() {
        let store = MemoryStore::new();
        store.put_string(HiveRoot::ClassesRoot, "K", "A", "C:\\Users\\from\\1");
        store.deny_access(HiveRoot::CurrentUser, "");
        store.put_string(HiveRoot::Users, "K", "B", "C:\\Users\\from\\2");

        let err = sweep(&store).unwrap_err();
        assert_eq!(err.hive, HiveRoot::CurrentUser);
        assert_eq!(err.source, StoreError::AccessDenied);
        // The first hive was already swept; the later one was never reached.
        assert_eq!(
            store.string_of(HiveRoot::ClassesRoot, "K", "A"),
            Some("C:\\Users\\to\\1".to_string())
        );
        assert_eq!(
            store.string_of(HiveRoot::Users, "K", "B"),
            Some("C:\\Users\\from\\2".to_string())
        );
    }

    #[test]
    fn abandoned_hive_does_not_stop_the_others() {
        let store = MemoryStore::new();
        store.put_string(HiveRoot::CurrentUser, "K", "A", "C:\\Users\\from\\1");
        store.fail_writes_with(HiveRoot::LocalMachine, "K", StoreError::AccessDenied);
        store.put_string(HiveRoot::LocalMachine, "K", "B", "C:\\Users\\from\\2");
        store.put_string(HiveRoot::Users, "K", "C", "C:\\Users\\from\\3");

        let report = sweep(&store).unwrap();
        // The refused write was still counted when its match was found.
        assert_eq!(report.matches, 3);
        assert!(!report.fully_completed());
        let statuses: Vec<bool> = report
            .hives
            .iter()
            .map(|h| matches!(h.status, HiveStatus::Completed))
            .collect();
        assert_eq!(statuses, vec![true, true, false, true, true]);
        assert_eq!(
            store.string_of(HiveRoot::Users, "K", "C"),
            Some("C:\\Users\\to\\3".to_string())
        );
    }

    #[test]
    fn no_handles_left_open_after_a_full_sweep() {
        let store = MemoryStore::new();
        store.put_string(HiveRoot::LocalMachine, "A\\B", "P", "C:\\Users\\from\\x");
        store.deny_access(HiveRoot::LocalMachine, "A\\Denied");
        sweep(&store).unwrap();
        assert_eq!(store.open_handles(), 0);
    }
}
