//! In-process transport for running several nodes in one program.
//!
//! Datagrams are the same bincode bytes the UDP transport sends, carried over
//! `crossbeam-channel`s tagged with the sending node's index (the stand-in for a source
//! address). Each node has a [LinkSwitch] that cuts it off from the fleet in both directions,
//! which is how tests pull a network cable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::NodeId;
use crate::network::{self, NetworkError, PeerTransport};
use crate::print;
use crate::world_view::{serial, NodeSnapshot};


/// Cable for one node. Cloning gives another handle to the same cable.
#[derive(Debug, Clone)]
pub struct LinkSwitch(Arc<AtomicBool>);

impl LinkSwitch {
    pub fn connect(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}


/// One node's end of the in-process fleet
pub struct LoopbackTransport {
    self_index: NodeId,
    outboxes: Vec<Sender<(NodeId, Vec<u8>)>>,
    inbox: Receiver<(NodeId, Vec<u8>)>,
    link: LinkSwitch,
}

/// Creates `node_count` connected transports, index `i` at position `i`.
pub fn fleet(node_count: usize) -> Vec<LoopbackTransport> {
    let (outboxes, inboxes): (Vec<_>, Vec<_>) = (0..node_count).map(|_| unbounded()).unzip();

    inboxes
        .into_iter()
        .enumerate()
        .map(|(i, inbox)| LoopbackTransport {
            self_index: i as NodeId,
            outboxes: outboxes.clone(),
            inbox,
            link: LinkSwitch(Arc::new(AtomicBool::new(true))),
        })
        .collect()
}

impl LoopbackTransport {
    /// Handle to this node's cable
    pub fn link(&self) -> LinkSwitch {
        self.link.clone()
    }

    /// Puts raw bytes in `to`'s inbox as if they came from `from`. For feeding garbage to a node.
    pub fn inject(&self, from: NodeId, to: NodeId, bytes: Vec<u8>) {
        if let Some(outbox) = self.outboxes.get(to as usize) {
            let _ = outbox.send((from, bytes));
        }
    }
}

impl PeerTransport for LoopbackTransport {
    fn broadcast(&mut self, snapshot: &NodeSnapshot) -> Result<(), NetworkError> {
        let total = self.outboxes.len().saturating_sub(1);
        if !self.link.is_connected() {
            return Err(NetworkError::Broadcast { failed: total, total });
        }

        let bytes = serial::serialize_snapshot(self.self_index, snapshot)?;
        let mut failed = 0;
        for (i, outbox) in self.outboxes.iter().enumerate() {
            if i == self.self_index as usize {
                continue;
            }
            if outbox.send((self.self_index, bytes.clone())).is_err() {
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(NetworkError::Broadcast { failed, total });
        }
        Ok(())
    }

    fn poll_incoming(&mut self) -> Vec<(NodeId, NodeSnapshot)> {
        let connected = self.link.is_connected();
        let mut received = Vec::new();

        for (from, bytes) in self.inbox.try_iter() {
            // Frakopla node høyrer ingenting, og det som kom medan kabelen var ute er tapt
            if !connected {
                continue;
            }
            match network::open_datagram(&bytes, from, self.self_index) {
                Ok(snapshot) => received.push((from, snapshot)),
                Err(e) => print::warn(format!("Dropped datagram from node {}: {}", from, e)),
            }
        }
        received
    }
}
