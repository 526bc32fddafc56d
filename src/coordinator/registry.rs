//! Live lease tracking for the coordinator.
//!
//! The registry is the coordinator's single source of truth for how many
//! clients currently hold a lease. Handlers register on accept and deregister
//! on exit; the supervisory loop polls the count to decide when the shared
//! child process should be running.
//!
//! # Thread Safety
//!
//! The registry uses `RwLock` to allow concurrent reads while serializing
//! writes to the lease map. Every increment and decrement happens under the
//! lock, so counts are never lost under concurrent handler churn.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// One live lease: an open client connection and what it last told us.
#[derive(Debug, Clone)]
pub struct LeaseEntry {
    /// Opaque connection identifier, unique for the coordinator's lifetime.
    pub id: u64,
    /// Last identity string the client announced. Empty until the first
    /// announcement arrives.
    pub identity: String,
    /// When the client last sent anything.
    pub last_seen: DateTime<Utc>,
}

/// The set of currently-connected client handlers.
pub struct LeaseRegistry {
    leases: RwLock<HashMap<u64, LeaseEntry>>,
    next_id: AtomicU64,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self {
            leases: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a lease for a newly-accepted connection. Returns the connection id
    /// the handler uses for all later calls.
    pub async fn register(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = LeaseEntry {
            id,
            identity: String::new(),
            last_seen: Utc::now(),
        };
        self.leases.write().await.insert(id, entry);
        id
    }

    /// Remove a lease. Returns how many remain. Removing an already-removed
    /// id is a no-op.
    pub async fn deregister(&self, id: u64) -> usize {
        let mut leases = self.leases.write().await;
        leases.remove(&id);
        leases.len()
    }

    /// Record an announcement from a lease, refreshing its last-activity
    /// timestamp. Returns true if the identity differs from the previous one,
    /// so the caller can log each distinct new identity exactly once.
    pub async fn note_identity(&self, id: u64, identity: &str) -> bool {
        let mut leases = self.leases.write().await;
        match leases.get_mut(&id) {
            Some(entry) => {
                entry.last_seen = Utc::now();
                if entry.identity != identity {
                    entry.identity = identity.to_string();
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// Number of currently-open client connections.
    pub async fn count(&self) -> usize {
        self.leases.read().await.len()
    }

    /// Copy of all active leases, ordered by connection id, for status
    /// reporting.
    pub async fn snapshot(&self) -> Vec<LeaseEntry> {
        let leases = self.leases.read().await;
        let mut entries: Vec<LeaseEntry> = leases.values().cloned().collect();
        entries.sort_by_key(|e| e.id);
        entries
    }
}

impl Default for LeaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn register_and_deregister_track_the_count() {
        let registry = LeaseRegistry::new();
        assert_eq!(registry.count().await, 0);

        let a = registry.register().await;
        let b = registry.register().await;
        assert_ne!(a, b);
        assert_eq!(registry.count().await, 2);

        assert_eq!(registry.deregister(a).await, 1);
        assert_eq!(registry.deregister(b).await, 0);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn deregister_is_idempotent() {
        let registry = LeaseRegistry::new();
        let id = registry.register().await;
        assert_eq!(registry.deregister(id).await, 0);
        assert_eq!(registry.deregister(id).await, 0);
    }

    #[tokio::test]
    async fn note_identity_reports_changes_once() {
        let registry = LeaseRegistry::new();
        let id = registry.register().await;

        assert!(registry.note_identity(id, "PID 1 BUILD_ID x").await);
        assert!(!registry.note_identity(id, "PID 1 BUILD_ID x").await);
        assert!(registry.note_identity(id, "PID 1 BUILD_ID y").await);

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].identity, "PID 1 BUILD_ID y");
    }

    #[tokio::test]
    async fn note_identity_on_unknown_lease_is_a_noop() {
        let registry = LeaseRegistry::new();
        assert!(!registry.note_identity(17, "anything").await);
    }

    #[tokio::test]
    async fn snapshot_is_ordered_by_connection_id() {
        let registry = LeaseRegistry::new();
        for _ in 0..5 {
            registry.register().await;
        }
        let ids: Vec<u64> = registry.snapshot().await.iter().map(|e| e.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn concurrent_churn_never_loses_a_decrement() {
        let registry = Arc::new(LeaseRegistry::new());
        let mut handles = Vec::new();

        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let id = registry.register().await;
                registry.note_identity(id, "worker").await;
                registry.deregister(id).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.count().await, 0);
    }
}
