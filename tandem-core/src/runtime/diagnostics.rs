//! Diagnostics registry.
//!
//! Counters are keyed by store (or mount target) path. An entry lives exactly
//! as long as the scope it was registered with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;

use super::scope::Scope;

#[derive(Debug, Default)]
struct Counters {
    commits: AtomicU64,
    failed_updates: AtomicU64,
    hook_failures: AtomicU64,
}

/// A point-in-time copy of one entry's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub commits: u64,
    pub failed_updates: u64,
    pub hook_failures: u64,
}

/// Injectable registry of per-path counters, owned by a runtime.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Arc<DashMap<String, Arc<Counters>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` and return the probe its owner increments.
    ///
    /// The entry is removed when `scope` is cancelled. Must be called inside
    /// a tokio runtime.
    pub fn register(&self, path: &str, scope: &Scope) -> Probe {
        let counters = Arc::new(Counters::default());
        self.entries.insert(path.to_string(), counters.clone());

        let entries = self.entries.clone();
        let key = path.to_string();
        let registered = counters.clone();
        scope.on_cancel(move || {
            entries.remove_if(&key, |_, current| Arc::ptr_eq(current, &registered));
        });

        Probe { counters }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<Stats> {
        self.entries.get(path).map(|entry| entry.snapshot())
    }

    /// All entries, sorted by path.
    pub fn snapshot(&self) -> IndexMap<String, Stats> {
        let mut snapshot: IndexMap<String, Stats> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        snapshot.sort_keys();
        snapshot
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Counters {
    fn snapshot(&self) -> Stats {
        Stats {
            commits: self.commits.load(Ordering::Relaxed),
            failed_updates: self.failed_updates.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
        }
    }
}

/// Write side of one diagnostics entry.
#[derive(Debug, Clone)]
pub struct Probe {
    counters: Arc<Counters>,
}

impl Probe {
    pub fn commit(&self) {
        self.counters.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_update(&self) {
        self.counters.failed_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hook_failure(&self) {
        self.counters.hook_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn probes_update_snapshots() {
        let diagnostics = Diagnostics::new();
        let scope = Scope::root("app");

        let b = diagnostics.register("b", &scope);
        let a = diagnostics.register("a", &scope);
        a.commit();
        a.commit();
        b.failed_update();
        b.hook_failure();

        let snapshot = diagnostics.snapshot();
        let keys: Vec<_> = snapshot.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(snapshot["a"].commits, 2);
        assert_eq!(
            snapshot["b"],
            Stats {
                commits: 0,
                failed_updates: 1,
                hook_failures: 1
            }
        );
    }

    #[tokio::test]
    async fn entries_leave_with_their_scope() {
        let diagnostics = Diagnostics::new();
        let root = Scope::root("app");
        let store_scope = root.child("counter");

        let _probe = diagnostics.register("counter", &store_scope);
        assert_eq!(diagnostics.len(), 1);

        root.cancel();
        for _ in 0..50 {
            if diagnostics.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(diagnostics.is_empty());
    }

    #[tokio::test]
    async fn snapshot_serializes_to_json() {
        let diagnostics = Diagnostics::new();
        let scope = Scope::root("app");
        diagnostics.register("counter", &scope).commit();

        let json = diagnostics.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"counter":{"commits":1,"failed_updates":0,"hook_failures":0}}"#
        );
    }
}
