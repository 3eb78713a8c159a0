//! # World view
//!
//! Everything one node believes about the fleet is kept in [NodeSnapshot]s: one for
//! itself and one last-known copy per peer (see [crate::peer_registry]).
//! The snapshot is also the unit that is broadcast every tick.
//!
//! - [floor_table] holds the per-floor call/lock record and the merge rules.
//! - [serial] turns snapshots into datagrams and back.
pub mod floor_table;
pub mod serial;

use serde::{Serialize, Deserialize};

pub use floor_table::{FloorRecord, FloorTable};


#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Direction a hall call is placed in, and the direction a car is serving calls in.
pub enum Direction {
    Up = 0,
    Down = 1,
}

impl Direction {
    /// Both directions, `Up` first
    pub const ALL: [Direction; 2] = [Direction::Up, Direction::Down];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Direction of travel from `from` to `to`, or `None` if they are the same floor
    pub fn towards(from: u8, to: u8) -> Option<Direction> {
        if to > from {
            Some(Direction::Up)
        } else if to < from {
            Some(Direction::Down)
        } else {
            None
        }
    }

    /// `true` if `floor` lies strictly beyond `reference` when travelling in this direction
    pub fn is_beyond(self, floor: u8, reference: u8) -> bool {
        match self {
            Direction::Up => floor > reference,
            Direction::Down => floor < reference,
        }
    }
}


#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Struct describing the current behaviour of an elevator
pub enum ElevatorBehaviour {
    Idle,
    Moving,
    DoorOpen,
}


/// The complete belief state of one node for one tick.
///
/// This is what gets broadcast, and what the peer registry stores per node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// State of the motion controller
    /// Default: [ElevatorBehaviour::Idle]
    pub behaviour: ElevatorBehaviour,

    /// Last floor the floor sensor reported
    /// Default: 0
    pub current_floor: u8,

    /// Floor the car is heading for. Equal to `current_floor` when there is nothing to do
    pub target_floor: u8,

    /// Direction the car is serving hall calls in
    /// Default: [Direction::Up]
    pub direction: Direction,

    /// Set by the node itself when it has made no physical progress for [crate::config::STUCK_TIMEOUT]
    pub disabled: bool,

    /// One record per floor, see [FloorRecord]
    pub floors: FloorTable,
}

impl NodeSnapshot {
    /// A fresh idle snapshot with an empty floor table of `num_floors` floors.
    pub fn new(num_floors: u8) -> Self {
        Self {
            behaviour: ElevatorBehaviour::Idle,
            current_floor: 0,
            target_floor: 0,
            direction: Direction::Up,
            disabled: false,
            floors: vec![FloorRecord::default(); num_floors as usize],
        }
    }

    pub fn num_floors(&self) -> u8 {
        self.floors.len() as u8
    }

    /// Record of the floor the car is standing at (or last passed)
    pub fn here(&self) -> Option<&FloorRecord> {
        self.floors.get(self.current_floor as usize)
    }
}
