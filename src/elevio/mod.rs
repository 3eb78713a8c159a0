//! ## Elevator I/O module for the local elevator
//!
//! The control loop talks to its car only through the [HardwareClient] trait.
//! Two back-ends are provided:
//!
//! - [elev::ElevatorClient]: TCP client for the elevator server (simulator or the real car in the lab).
//! - [sim::SimElevator]: in-memory car, scripted through a [sim::SimHandle]. Used by tests.
//!
//! ## Overview
//! - `Dirn`: motor command.
//! - `CallType`: which of the three buttons on a floor.
//! - `ButtonSignal`: one floor's worth of button readings.
//! - `HardwareError`: what can go wrong talking to the car. Never fatal for the control loop,
//!   see [report].

pub mod elev;
pub mod sim;

use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::print;
use crate::world_view::Direction;


#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Motor command
pub enum Dirn {
    Down = -1,
    #[default]
    Stop = 0,
    Up = 1,
}

impl From<Direction> for Dirn {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Up => Dirn::Up,
            Direction::Down => Dirn::Down,
        }
    }
}

/// Represents the type of call for an elevator.
///
/// ## Variants
/// - `UP`: Hall call going up.
/// - `DOWN`: Hall call going down.
/// - `INSIDE`: Cab call, from inside the elevator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)] // Ensures the enum is stored as a single byte.
pub enum CallType {
    /// Call to go up.
    UP = 0,

    /// Call to go down.
    DOWN = 1,

    /// Call from inside the elevator.
    INSIDE = 2,
}

impl CallType {
    /// All three, in wire order
    pub const ALL: [CallType; 3] = [CallType::UP, CallType::DOWN, CallType::INSIDE];

    /// `true` if the button exists on `floor` in a building with `num_floors` floors.
    /// There is no up button on the top floor and no down button on the ground floor.
    pub fn exists_on(self, floor: u8, num_floors: u8) -> bool {
        match self {
            CallType::UP => floor + 1 < num_floors,
            CallType::DOWN => floor > 0,
            CallType::INSIDE => floor < num_floors,
        }
    }
}

impl From<Direction> for CallType {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::Up => CallType::UP,
            Direction::Down => CallType::DOWN,
        }
    }
}

/// Button readings for one floor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSignal {
    pub up: bool,
    pub down: bool,
    pub cab: bool,
}

impl ButtonSignal {
    pub fn get(&self, call: CallType) -> bool {
        match call {
            CallType::UP => self.up,
            CallType::DOWN => self.down,
            CallType::INSIDE => self.cab,
        }
    }

    pub fn set(&mut self, call: CallType, value: bool) {
        match call {
            CallType::UP => self.up = value,
            CallType::DOWN => self.down = value,
            CallType::INSIDE => self.cab = value,
        }
    }
}


/// Errors from talking to the car
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("not connected to the elevator")]
    Disconnected,

    #[error("reply {got:?} does not answer command {expected}")]
    BadReply { expected: u8, got: [u8; 4] },
}


/// What the control loop needs from the car.
///
/// Every call is bounded in time. A failed call is reported and the tick moves on.
#[allow(async_fn_in_trait)]
pub trait HardwareClient {
    async fn set_motor_direction(&mut self, dirn: Dirn) -> Result<(), HardwareError>;

    async fn set_button_lamp(&mut self, floor: u8, call: CallType, on: bool) -> Result<(), HardwareError>;

    async fn set_floor_indicator(&mut self, floor: u8) -> Result<(), HardwareError>;

    async fn set_door_lamp(&mut self, on: bool) -> Result<(), HardwareError>;

    /// One [ButtonSignal] per floor
    async fn get_button_signals(&mut self) -> Result<Vec<ButtonSignal>, HardwareError>;

    /// `Some(floor)` at a floor, `None` between floors
    async fn get_floor_sensor(&mut self) -> Result<Option<u8>, HardwareError>;

    async fn get_obstruction_signal(&mut self) -> Result<bool, HardwareError>;

    /// Resets the elevator server. Called once at start-up
    async fn reload_config(&mut self) -> Result<(), HardwareError>;
}


/// Logs a failed hardware call. Returns the value on success.
///
/// ## Example
/// ```ignore
/// if let Some(floor) = elevio::report(hw.get_floor_sensor().await, "floor sensor") { .. }
/// ```
pub fn report<T>(result: Result<T, HardwareError>, what: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            print::err(format!("Hardware: {} failed: {}", what, e));
            None
        }
    }
}
