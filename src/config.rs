//! # config.rs – Centralized Parameter Store
//!
//! This module holds all static program parameters used throughout the system,
//! and the [NodeConfig] a single node is started with.
//! Keeping configuration in one place makes tuning, experimentation, and testing easier.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Mutex;
use std::time::Duration;
use once_cell::sync::Lazy;

/// Index of a node in the fleet. Also used as the lock owner in the floor table.
pub type NodeId = u8;

//
// ──────────────────────────────────────────────────────────────
//   1. NETWORK SETTINGS
// ──────────────────────────────────────────────────────────────
//

/// UDP ports the fleet nodes listen on when nothing else is given
pub const DEFAULT_PEER_PORTS: [u16; 3] = [10042, 10043, 10044];

/// Port of the elevator server for node 0. Node `i` uses `ELEVATOR_SERVER_BASE_PORT + i`
pub const ELEVATOR_SERVER_BASE_PORT: u16 = 15657;

/// Bind address for the peer socket
pub const BC_LISTEN_ADDR: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// Key used to filter out datagrams that are not snapshots from our fleet
pub const KEY_STR: &str = "Gruppe 25";

/// Size of UDP receive buffer in bytes
pub const UDP_BUFFER: usize = u16::MAX as usize;

//
// ──────────────────────────────────────────────────────────────
//   2. SYSTEM & ELEVATOR PARAMETERS
// ──────────────────────────────────────────────────────────────
//

/// Default number of floors in Sanntidshallen setup
pub const DEFAULT_NUM_FLOORS: u8 = 4;

/// Largest accepted node index. Keeps `node_count` within `NodeId` for the index casts in the peer registry
pub const MAX_NODE_ID: NodeId = 254;

//
// ──────────────────────────────────────────────────────────────
//   3. TIMING & TIMEOUTS & INTERVALS
// ──────────────────────────────────────────────────────────────
//

/// A peer not heard from within this window is excluded from every unanimity check
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(6);

/// How long the door stays open after the last obstruction cleared
pub const DOOR_OPEN_DURATION: Duration = Duration::from_secs(3);

/// Time without floor progress (or with the door held open) before the node marks itself disabled
pub const STUCK_TIMEOUT: Duration = Duration::from_secs(8);

/// Sleep between two ticks of the control loop
pub const POLL_PERIOD: Duration = Duration::from_millis(20);

/// Timeout for one request/response exchange with the elevator server
pub const HW_REQUEST_TIMEOUT: Duration = Duration::from_millis(50);

/// Number of attempts for a hardware request before the tick gives up on it
pub const HW_RETRIES: u32 = 3;

/// Upper bound on how long start-up homing may drive the car looking for a floor
pub const HOMING_TIMEOUT: Duration = Duration::from_secs(20);

/// How often the fleet table is printed when `PRINT_WV_ON` is set
pub const PRINT_FLEET_PERIOD: Duration = Duration::from_millis(500);

//
// ──────────────────────────────────────────────────────────────
//   4. NODE CONFIGURATION
// ──────────────────────────────────────────────────────────────
//

/// Everything a node needs to know about itself and the fleet at start-up.
///
/// Built by [crate::init::parse_args], or by hand in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// This node's index. Also the index of its own entry in `peers`.
    pub index: NodeId,

    /// UDP endpoint of every node in the fleet, self included, ordered by node index
    pub peers: Vec<SocketAddr>,

    /// Address of the elevator server driving this node's car
    pub elevator_addr: SocketAddr,

    /// Number of floors served by the fleet
    pub num_floors: u8,
}

impl NodeConfig {
    /// Config for node `index` in a fleet of `DEFAULT_PEER_PORTS.len()` nodes on localhost.
    pub fn local_default(index: NodeId) -> Self {
        let peers = DEFAULT_PEER_PORTS
            .iter()
            .map(|port| SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, *port)))
            .collect();
        NodeConfig {
            index,
            peers,
            elevator_addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                ELEVATOR_SERVER_BASE_PORT.saturating_add(index as u16),
            )),
            num_floors: DEFAULT_NUM_FLOORS,
        }
    }

    /// Number of nodes in the fleet
    pub fn node_count(&self) -> usize {
        self.peers.len()
    }

    /// UDP endpoint this node binds to
    pub fn self_endpoint(&self) -> Option<SocketAddr> {
        self.peers.get(self.index as usize).copied()
    }
}

//
// ──────────────────────────────────────────────────────────────
//   5. LOGGING CONFIGURATION
// ──────────────────────────────────────────────────────────────
//

/// Enable/disable printing of the fleet table
pub static PRINT_WV_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of errors
pub static PRINT_ERR_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of warnings
pub static PRINT_WARN_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of success messages
pub static PRINT_OK_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of general info
pub static PRINT_INFO_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable miscellaneous debug prints
pub static PRINT_ELSE_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));
