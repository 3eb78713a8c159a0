//! # Peer registry
//!
//! Last-known [NodeSnapshot] and last-seen time for every node in the fleet, self included.
//! Entries are created at start-up and never removed: a node that went quiet can always
//! come back by broadcasting again.
//!
//! Liveness is relative to our own clock entry: node `i` is live iff
//! `last_seen[i] + DISCONNECT_TIMEOUT >= last_seen[self]`. Our own entry is touched once per
//! tick, so a peer that stops broadcasting drops out after [config::DISCONNECT_TIMEOUT].

use tokio::time::Instant;

use crate::config::{self, NodeId};
use crate::network::NetworkError;
use crate::world_view::NodeSnapshot;


/// What we know about one node
#[derive(Debug, Clone)]
pub struct PeerEntry {
    pub snapshot: NodeSnapshot,
    pub last_seen: Instant,
}

/// The parts of a node's entry the lock arbitration looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub live: bool,
    pub disabled: bool,
    pub current_floor: u8,
}

impl Standing {
    /// A node gives up its claim on `floor` if it has gone stale, or if it is disabled
    /// somewhere else and so has no physical reason to keep it.
    pub fn concedes(&self, floor: usize) -> bool {
        !self.live || (self.disabled && self.current_floor as usize != floor)
    }
}


/// Belief state for the whole fleet, as seen from one node.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    self_index: NodeId,
    entries: Vec<PeerEntry>,
}

impl PeerRegistry {
    /// Creates a registry for a fleet of `node_count` nodes with `num_floors` floors.
    ///
    /// Every entry starts out as an empty idle snapshot seen at `now`, so all peers count
    /// as live for the first [config::DISCONNECT_TIMEOUT].
    ///
    /// ## Returns
    /// - [NetworkError::BadIndex] if `self_index` is not a valid index in the fleet.
    pub fn new(self_index: NodeId, node_count: usize, num_floors: u8, now: Instant) -> Result<Self, NetworkError> {
        if self_index as usize >= node_count {
            return Err(NetworkError::BadIndex(self_index));
        }
        let entries = (0..node_count)
            .map(|_| PeerEntry { snapshot: NodeSnapshot::new(num_floors), last_seen: now })
            .collect();
        Ok(Self { self_index, entries })
    }

    pub fn self_index(&self) -> NodeId {
        self.self_index
    }

    pub fn node_count(&self) -> usize {
        self.entries.len()
    }

    pub fn num_floors(&self) -> u8 {
        self.local().num_floors()
    }

    /// Our own snapshot
    pub fn local(&self) -> &NodeSnapshot {
        &self.entries[self.self_index as usize].snapshot
    }

    /// Our own snapshot. The only slot the control loop writes directly.
    pub fn local_mut(&mut self) -> &mut NodeSnapshot {
        &mut self.entries[self.self_index as usize].snapshot
    }

    pub fn entry(&self, index: NodeId) -> Option<&PeerEntry> {
        self.entries.get(index as usize)
    }

    pub fn snapshot(&self, index: NodeId) -> Option<&NodeSnapshot> {
        self.entry(index).map(|e| &e.snapshot)
    }

    /// Every stored snapshot with its node index, self included, in index order
    pub fn snapshots(&self) -> impl Iterator<Item = (NodeId, &NodeSnapshot)> + '_ {
        self.entries.iter().enumerate().map(|(i, e)| (i as NodeId, &e.snapshot))
    }

    /// Moves our own clock entry forward. Called once per tick.
    pub fn touch_self(&mut self, now: Instant) {
        let me = self.self_index as usize;
        self.entries[me].last_seen = now;
    }

    /// Stores a snapshot received from `sender` and marks it as seen at `now`.
    ///
    /// ## Returns
    /// - [NetworkError::BadIndex] if `sender` is ourselves or outside the fleet.
    /// - [NetworkError::BadShape] if the snapshot has a different number of floors than ours.
    ///
    /// Rejected snapshots leave the registry untouched.
    pub fn record(&mut self, sender: NodeId, snapshot: NodeSnapshot, now: Instant) -> Result<(), NetworkError> {
        if sender == self.self_index || sender as usize >= self.entries.len() {
            return Err(NetworkError::BadIndex(sender));
        }
        if snapshot.floors.len() != self.local().floors.len() {
            return Err(NetworkError::BadShape {
                expected: self.local().floors.len(),
                got: snapshot.floors.len(),
            });
        }
        let entry = &mut self.entries[sender as usize];
        entry.snapshot = snapshot;
        entry.last_seen = now;
        Ok(())
    }

    /// `true` if `index` has been heard from within [config::DISCONNECT_TIMEOUT] of our own last tick.
    /// Out-of-range indices are never live.
    pub fn is_live(&self, index: NodeId) -> bool {
        let own = self.entries[self.self_index as usize].last_seen;
        match self.entries.get(index as usize) {
            Some(entry) => entry.last_seen + config::DISCONNECT_TIMEOUT >= own,
            None => false,
        }
    }

    /// All live nodes, self included, in index order
    pub fn live_nodes(&self) -> Vec<NodeId> {
        (0..self.entries.len() as NodeId).filter(|i| self.is_live(*i)).collect()
    }

    /// All live nodes except ourselves
    pub fn live_peers(&self) -> Vec<NodeId> {
        self.live_nodes().into_iter().filter(|i| *i != self.self_index).collect()
    }

    /// Liveness, disabled flag and floor of every node, indexed by node
    pub fn standings(&self) -> Vec<Standing> {
        (0..self.entries.len())
            .map(|i| Standing {
                live: self.is_live(i as NodeId),
                disabled: self.entries[i].snapshot.disabled,
                current_floor: self.entries[i].snapshot.current_floor,
            })
            .collect()
    }

    /// Our own snapshot and the stored copy of `peer`'s, both mutable, for merging.
    ///
    /// `None` if `peer` is ourselves or outside the fleet.
    pub fn local_and_peer_mut(&mut self, peer: NodeId) -> Option<(&mut NodeSnapshot, &mut NodeSnapshot)> {
        let me = self.self_index as usize;
        let p = peer as usize;
        if p == me || p >= self.entries.len() {
            return None;
        }
        if me < p {
            let (low, high) = self.entries.split_at_mut(p);
            Some((&mut low[me].snapshot, &mut high[0].snapshot))
        } else {
            let (low, high) = self.entries.split_at_mut(me);
            Some((&mut high[0].snapshot, &mut low[p].snapshot))
        }
    }
}
