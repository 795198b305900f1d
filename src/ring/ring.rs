//! Hash ring with virtual nodes.
//!
//! # Responsibilities
//! - Place each member at `virtual_nodes` pseudo-random positions
//! - Map a key to the member owning the first position at or after its hash
//! - Pick a uniformly random member (used to choose a shrink victim)

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::ring::hash::hash_key;

/// Summary of the ring's shape, reported on the fleet-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RingStats {
    pub members: usize,
    pub virtual_nodes: usize,
    pub positions: usize,
}

/// Consistent hash ring over members identified by a string form.
///
/// Invariant: `positions` holds exactly `members.len() * virtual_nodes`
/// entries, sorted ascending by `(position, member)`.
#[derive(Debug, Clone)]
pub struct HashRing<M> {
    virtual_nodes: usize,
    members: BTreeSet<M>,
    positions: Vec<(u32, M)>,
}

impl<M> HashRing<M>
where
    M: AsRef<str> + Clone + Ord,
{
    /// Create an empty ring. A virtual node count of zero is raised to one.
    pub fn new(virtual_nodes: usize) -> Self {
        Self {
            virtual_nodes: virtual_nodes.max(1),
            members: BTreeSet::new(),
            positions: Vec::new(),
        }
    }

    /// Insert a member. Returns false (and changes nothing) if it was already present.
    pub fn add_member(&mut self, member: M) -> bool {
        if self.members.contains(&member) {
            return false;
        }

        self.positions.reserve(self.virtual_nodes);
        for i in 0..self.virtual_nodes {
            let position = hash_key(&format!("{}:{}", member.as_ref(), i));
            self.positions.push((position, member.clone()));
        }
        self.positions.sort_unstable();
        self.members.insert(member);
        true
    }

    /// Remove a member and all of its positions. Returns false if it was absent.
    pub fn remove_member(&mut self, member: &M) -> bool {
        if !self.members.remove(member) {
            return false;
        }
        // retain keeps the remaining positions sorted
        self.positions.retain(|(_, owner)| owner != member);
        true
    }

    /// Find the member owning `key`, or `None` when the ring is empty.
    pub fn lookup(&self, key: &str) -> Option<&M> {
        if self.positions.is_empty() {
            return None;
        }

        let h = hash_key(key);
        let idx = self.positions.partition_point(|(position, _)| *position < h);
        let idx = if idx == self.positions.len() { 0 } else { idx };
        Some(&self.positions[idx].1)
    }

    /// Uniformly random member, or `None` when the ring is empty.
    pub fn random_member(&self) -> Option<&M> {
        if self.members.is_empty() {
            return None;
        }
        let idx = fastrand::usize(..self.members.len());
        self.members.iter().nth(idx)
    }

    pub fn members(&self) -> impl Iterator<Item = &M> {
        self.members.iter()
    }

    pub fn contains(&self, member: &M) -> bool {
        self.members.contains(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn virtual_nodes(&self) -> usize {
        self.virtual_nodes
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            members: self.members.len(),
            virtual_nodes: self.virtual_nodes,
            positions: self.positions.len(),
        }
    }

    /// Count how many of `sample` synthetic keys each member owns.
    ///
    /// Keys are fixed (`sample_key_0`, `sample_key_1`, ...) so repeated calls
    /// against the same membership give the same answer.
    pub fn load_distribution(&self, sample: usize) -> BTreeMap<M, usize> {
        let mut distribution: BTreeMap<M, usize> =
            self.members.iter().map(|m| (m.clone(), 0)).collect();

        for i in 0..sample {
            if let Some(owner) = self.lookup(&format!("sample_key_{}", i)) {
                if let Some(count) = distribution.get_mut(owner) {
                    *count += 1;
                }
            }
        }
        distribution
    }
}
