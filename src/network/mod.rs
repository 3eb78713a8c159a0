//! ## Network module
//!
//! Everything a node says to its peers is one [NodeSnapshot] per tick, and everything it
//! hears is the peers' snapshots. This module hides how they travel.
//!
//! ## Sub-modules
//! - [udp_peer]: one non-blocking UDP socket per node, datagrams sent directly to every peer endpoint.
//! - [loopback]: in-process fleet over `crossbeam-channel`, used by tests and simulations.
//!
//! ## Key Features
//! - [PeerTransport] is the only thing the control loop knows about. Broadcasting is best-effort
//!   and receiving never blocks.
//! - Every incoming datagram is validated by [open_datagram] before the loop ever sees it:
//!   wrong key, garbage bytes, or a declared sender that does not match where it came from
//!   are logged and dropped.

pub mod udp_peer;
pub mod loopback;

use std::net::SocketAddr;

use crate::config::NodeId;
use crate::world_view::{serial, NodeSnapshot};


/// Errors from encoding, sending, receiving or accepting a snapshot
#[derive(Debug, thiserror::Error)]
pub enum NetworkError
{
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode snapshot: {0}")]
    Encode(#[source] bincode::Error),

    #[error("could not decode datagram: {0}")]
    Decode(#[source] bincode::Error),

    #[error("datagram from unknown address {0}")]
    UnknownSender(SocketAddr),

    #[error("datagram carries foreign key {0:?}")]
    WrongKey(String),

    #[error("datagram claims to be from node {declared}, but came from node {actual}")]
    SenderMismatch { declared: NodeId, actual: NodeId },

    #[error("node index {0} is not a peer in this fleet")]
    BadIndex(NodeId),

    #[error("snapshot has {got} floors, expected {expected}")]
    BadShape { expected: usize, got: usize },

    #[error("failed to reach {failed} of {total} peers")]
    Broadcast { failed: usize, total: usize },
}


/// The capability the control loop needs from the network.
///
/// Both calls return immediately.
pub trait PeerTransport
{
    /// Sends `snapshot` to every other node. Best-effort: an error means at least one
    /// peer could not be reached, the others were still attempted.
    fn broadcast(&mut self, snapshot: &NodeSnapshot) -> Result<(), NetworkError>;

    /// Everything that has arrived since the last call, as `(sender, snapshot)`.
    /// Invalid datagrams are logged and left out.
    fn poll_incoming(&mut self) -> Vec<(NodeId, NodeSnapshot)>;
}


/// Decodes a datagram that arrived from node `actual` at node `self_index`.
///
/// ## Returns
/// - The snapshot, if the key matches and the declared sender is `actual`.
/// - [NetworkError::BadIndex] if the datagram came from ourselves.
/// - Otherwise the decode/key/sender error.
pub fn open_datagram(data: &[u8], actual: NodeId, self_index: NodeId) -> Result<NodeSnapshot, NetworkError>
{
    let (declared, snapshot) = serial::deserialize_snapshot(data)?;
    if declared != actual {
        return Err(NetworkError::SenderMismatch { declared, actual });
    }
    if actual == self_index {
        return Err(NetworkError::BadIndex(actual));
    }
    Ok(snapshot)
}
