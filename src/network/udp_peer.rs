//! UDP transport between fleet nodes
//!
//! Each node binds one socket on its own port from [NodeConfig::peers](crate::config::NodeConfig)
//! and sends its snapshot straight to every other endpoint in that list. The sender of an
//! incoming datagram is identified by its source address, and must agree with the index
//! written inside the datagram.

use std::io::ErrorKind;
use std::net::{SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::{self, NodeId};
use crate::network::{self, NetworkError, PeerTransport};
use crate::print;
use crate::world_view::{serial, NodeSnapshot};


/// Non-blocking UDP socket plus the fleet's endpoint list.
pub struct UdpPeerTransport {
    socket: UdpSocket,
    self_index: NodeId,
    peers: Vec<SocketAddr>,
    buf: Vec<u8>,
}

impl UdpPeerTransport {
    /// Binds `0.0.0.0:<port of peers[self_index]>`.
    ///
    /// The socket is set up with `socket2` (reuse address, broadcast allowed, non-blocking)
    /// before it is handed over to `std`.
    ///
    /// ## Returns
    /// - [NetworkError::BadIndex] if `self_index` has no entry in `peers`.
    /// - [NetworkError::Io] if the socket could not be created or bound.
    pub fn bind(self_index: NodeId, peers: Vec<SocketAddr>) -> Result<Self, NetworkError> {
        let own = peers.get(self_index as usize).ok_or(NetworkError::BadIndex(self_index))?;
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(config::BC_LISTEN_ADDR, own.port()));

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_broadcast(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&bind_addr.into())?;

        Ok(Self {
            socket: socket.into(),
            self_index,
            peers,
            buf: vec![0; config::UDP_BUFFER],
        })
    }

    fn sender_index(&self, src: SocketAddr) -> Option<NodeId> {
        self.peers.iter().position(|p| *p == src).map(|i| i as NodeId)
    }

    fn accept(&self, len: usize, src: SocketAddr) -> Result<(NodeId, NodeSnapshot), NetworkError> {
        let actual = self.sender_index(src).ok_or(NetworkError::UnknownSender(src))?;
        let snapshot = network::open_datagram(&self.buf[..len], actual, self.self_index)?;
        Ok((actual, snapshot))
    }
}

impl PeerTransport for UdpPeerTransport {
    fn broadcast(&mut self, snapshot: &NodeSnapshot) -> Result<(), NetworkError> {
        let bytes = serial::serialize_snapshot(self.self_index, snapshot)?;

        let mut failed = 0;
        let mut total = 0;
        for (i, addr) in self.peers.iter().enumerate() {
            if i == self.self_index as usize {
                continue;
            }
            total += 1;
            if let Err(e) = self.socket.send_to(&bytes, addr) {
                print::warn(format!("Klarte ikkje sende snapshot til {}: {}", addr, e));
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(NetworkError::Broadcast { failed, total });
        }
        Ok(())
    }

    fn poll_incoming(&mut self) -> Vec<(NodeId, NodeSnapshot)> {
        let mut received = Vec::new();
        loop {
            let (len, src) = match self.socket.recv_from(&mut self.buf) {
                Ok(res) => res,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    // Tomt buffer, ferdig for denne tikken
                    break;
                }
                Err(e) => {
                    print::err(format!("Error receiving UDP packet: {}", e));
                    break;
                }
            };

            match self.accept(len, src) {
                Ok(msg) => received.push(msg),
                Err(e) => print::warn(format!("Dropped datagram from {}: {}", src, e)),
            }
        }
        received
    }
}
