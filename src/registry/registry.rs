//! Registry of live workers.
//!
//! # Responsibilities
//! - Record registrations and evictions
//! - Keep the hash ring in step with membership
//! - Hand out consistent point-in-time snapshots to readers

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::registry::address::WorkerAddr;
use crate::ring::{HashRing, RingStats};

/// One registered worker.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub address: WorkerAddr,
    /// Seconds since the unix epoch.
    pub registered_at: u64,
}

/// Immutable membership snapshot: the ring plus the entry table.
#[derive(Debug, Clone)]
pub struct Membership {
    ring: HashRing<WorkerAddr>,
    entries: BTreeMap<WorkerAddr, RegistryEntry>,
}

impl Membership {
    fn new(virtual_nodes: usize) -> Self {
        Self {
            ring: HashRing::new(virtual_nodes),
            entries: BTreeMap::new(),
        }
    }

    pub fn ring(&self) -> &HashRing<WorkerAddr> {
        &self.ring
    }

    pub fn lookup(&self, key: &str) -> Option<&WorkerAddr> {
        self.ring.lookup(key)
    }

    pub fn contains(&self, addr: &WorkerAddr) -> bool {
        self.ring.contains(addr)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn addresses(&self) -> Vec<WorkerAddr> {
        self.ring.members().cloned().collect()
    }

    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.entries.values().cloned().collect()
    }
}

/// Source of truth for which workers may receive traffic.
///
/// Writers (registration handlers, the health loop, drain) copy the current
/// snapshot, modify the copy and swap it in. Readers never block.
#[derive(Debug)]
pub struct WorkerRegistry {
    current: ArcSwap<Membership>,
}

impl WorkerRegistry {
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            current: ArcSwap::from_pointee(Membership::new(virtual_nodes)),
        }
    }

    /// Current membership snapshot.
    pub fn load(&self) -> Arc<Membership> {
        self.current.load_full()
    }

    /// Add a worker. Returns true if it was not already a member.
    ///
    /// Re-registering an existing worker only refreshes `registered_at`.
    pub fn register(&self, addr: WorkerAddr) -> bool {
        let now = unix_now();
        let previous = self.current.rcu(|current| {
            let mut next = Membership::clone(current);
            next.ring.add_member(addr.clone());
            next.entries.insert(
                addr.clone(),
                RegistryEntry {
                    address: addr.clone(),
                    registered_at: now,
                },
            );
            next
        });
        !previous.contains(&addr)
    }

    /// Remove a worker. Returns true if it was a member.
    pub fn evict(&self, addr: &WorkerAddr) -> bool {
        let previous = self.current.rcu(|current| {
            if !current.contains(addr) {
                return Membership::clone(current);
            }
            let mut next = Membership::clone(current);
            next.ring.remove_member(addr);
            next.entries.remove(addr);
            next
        });
        previous.contains(addr)
    }

    /// Point-in-time list of member addresses.
    pub fn snapshot(&self) -> Vec<WorkerAddr> {
        self.current.load().addresses()
    }

    /// Member owning `key`, if any.
    pub fn lookup(&self, key: &str) -> Option<WorkerAddr> {
        self.current.load().lookup(key).cloned()
    }

    pub fn random_member(&self) -> Option<WorkerAddr> {
        self.current.load().ring.random_member().cloned()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    pub fn stats(&self) -> RingStats {
        self.current.load().ring.stats()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
