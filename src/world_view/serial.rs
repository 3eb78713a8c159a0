//! Serialization and Deserialization of [NodeSnapshot] datagrams
//!
//! A datagram is a bincode-encoded `(key, sender, snapshot)` triple. The key filters out
//! traffic that is not from our fleet, the sender is checked against the source address
//! by the transport.

use bincode::Options;
use serde::{Serialize, Deserialize};

use crate::config::{self, NodeId};
use crate::network::NetworkError;
use crate::world_view::NodeSnapshot;


#[derive(Serialize)]
struct OutgoingMessage<'a> {
    key: &'a str,
    sender: NodeId,
    snapshot: &'a NodeSnapshot,
}

#[derive(Deserialize)]
struct IncomingMessage {
    key: String,
    sender: NodeId,
    snapshot: NodeSnapshot,
}

// Grense på størrelse, så søppel-data ikkje kan be om enorme allokeringar
fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(config::UDP_BUFFER as u64)
}


/// Serializes `snapshot` from node `sender` into a datagram.
///
/// ## Parameters
/// - `sender`: Index of the node the snapshot belongs to.
/// - `snapshot`: The snapshot to encode.
///
/// ## Returns
/// - The datagram bytes, or [NetworkError::Encode] if bincode fails.
pub fn serialize_snapshot(sender: NodeId, snapshot: &NodeSnapshot) -> Result<Vec<u8>, NetworkError> {
    let message = OutgoingMessage {
        key: config::KEY_STR,
        sender,
        snapshot,
    };
    codec().serialize(&message).map_err(NetworkError::Encode)
}

/// Deserializes a datagram produced by [serialize_snapshot].
///
/// ## Returns
/// - `(sender, snapshot)` on success.
/// - [NetworkError::Decode] if the bytes are not a snapshot datagram.
/// - [NetworkError::WrongKey] if the datagram is from another fleet.
pub fn deserialize_snapshot(data: &[u8]) -> Result<(NodeId, NodeSnapshot), NetworkError> {
    let message: IncomingMessage = codec().deserialize(data).map_err(NetworkError::Decode)?;
    if message.key != config::KEY_STR {
        return Err(NetworkError::WrongKey(message.key));
    }
    Ok((message.sender, message.snapshot))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::world_view::{Direction, ElevatorBehaviour};

    #[test]
    fn datagram_carries_sender_and_snapshot() {
        let mut snap = NodeSnapshot::new(4);
        snap.behaviour = ElevatorBehaviour::Moving;
        snap.target_floor = 3;
        snap.floors[3].hall_down_requested = true;
        snap.floors[3].lock(Direction::Down, Some(1));

        let bytes = serialize_snapshot(1, &snap).unwrap();
        let (sender, decoded) = deserialize_snapshot(&bytes).unwrap();

        assert_eq!(sender, 1);
        assert_eq!(decoded, snap);
    }

    #[test]
    fn foreign_key_is_rejected() {
        let snap = NodeSnapshot::new(2);
        let message = OutgoingMessage { key: "Gruppe 12", sender: 0, snapshot: &snap };
        let bytes = codec().serialize(&message).unwrap();

        assert!(matches!(deserialize_snapshot(&bytes), Err(NetworkError::WrongKey(k)) if k == "Gruppe 12"));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let garbage = [0xffu8; 7];
        assert!(matches!(deserialize_snapshot(&garbage), Err(NetworkError::Decode(_))));
    }
}
