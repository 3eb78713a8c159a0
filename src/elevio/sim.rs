//! In-memory car for tests and simulations.
//!
//! [SimElevator] implements [HardwareClient] on top of shared state; the matching [SimHandle]
//! is the "outside world": it presses buttons, moves the car between floors, holds the
//! obstruction switch and reads back what the controller did to motor and lamps.
//!
//! Button presses latch until the controller has read them once, like a person pressing and
//! letting go between two polls.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::elevio::{ButtonSignal, CallType, Dirn, HardwareClient, HardwareError};


/// Everything the simulated car knows
#[derive(Debug, Clone, Default)]
pub struct SimState {
    pub num_floors: u8,
    pub floor: Option<u8>,
    pub obstruction: bool,
    pub motor: Dirn,
    pub door_lamp: bool,
    pub floor_indicator: Option<u8>,
    pub button_lamps: Vec<ButtonSignal>,
    pub pressed: Vec<ButtonSignal>,
    pub reloads: u32,
    /// Number of upcoming hardware calls that fail with [HardwareError::Timeout]
    pub failures: u32,
}

/// Outside-world handle to a [SimElevator]
#[derive(Debug, Clone)]
pub struct SimHandle(Arc<Mutex<SimState>>);

/// Simulated car, see the module docs
#[derive(Debug)]
pub struct SimElevator {
    state: SimHandle,
}

impl SimElevator {
    /// A car with `num_floors` floors, standing at `floor` (`None` = between floors).
    pub fn new(num_floors: u8, floor: Option<u8>) -> (Self, SimHandle) {
        let state = SimState {
            num_floors,
            floor,
            button_lamps: vec![ButtonSignal::default(); num_floors as usize],
            pressed: vec![ButtonSignal::default(); num_floors as usize],
            ..SimState::default()
        };
        let handle = SimHandle(Arc::new(Mutex::new(state)));
        (SimElevator { state: handle.clone() }, handle)
    }

    fn call(&mut self) -> Result<MutexGuard<'_, SimState>, HardwareError> {
        let mut state = self.state.lock();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(HardwareError::Timeout(crate::config::HW_REQUEST_TIMEOUT));
        }
        Ok(state)
    }
}

impl SimHandle {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the whole state
    pub fn state(&self) -> SimState {
        self.lock().clone()
    }

    pub fn press(&self, floor: u8, call: CallType) {
        if let Some(button) = self.lock().pressed.get_mut(floor as usize) {
            button.set(call, true);
        }
    }

    pub fn set_floor(&self, floor: Option<u8>) {
        self.lock().floor = floor;
    }

    pub fn set_obstruction(&self, on: bool) {
        self.lock().obstruction = on;
    }

    /// Makes the next `n` hardware calls fail
    pub fn fail_next(&self, n: u32) {
        self.lock().failures = n;
    }

    /// Moves the car one floor in the direction the motor is running. Returns the new floor.
    /// Does nothing if the motor is stopped, the car is between floors, or at the end of the shaft.
    pub fn travel_one_floor(&self) -> Option<u8> {
        let mut state = self.lock();
        let floor = state.floor?;
        let next = match state.motor {
            Dirn::Up if floor + 1 < state.num_floors => floor + 1,
            Dirn::Down if floor > 0 => floor - 1,
            _ => floor,
        };
        state.floor = Some(next);
        Some(next)
    }

    pub fn motor(&self) -> Dirn {
        self.lock().motor
    }

    pub fn door_lamp(&self) -> bool {
        self.lock().door_lamp
    }

    pub fn floor_indicator(&self) -> Option<u8> {
        self.lock().floor_indicator
    }

    pub fn button_lamp(&self, floor: u8, call: CallType) -> bool {
        self.lock().button_lamps.get(floor as usize).map(|b| b.get(call)).unwrap_or(false)
    }
}

impl HardwareClient for SimElevator {
    async fn set_motor_direction(&mut self, dirn: Dirn) -> Result<(), HardwareError> {
        self.call()?.motor = dirn;
        Ok(())
    }

    async fn set_button_lamp(&mut self, floor: u8, call: CallType, on: bool) -> Result<(), HardwareError> {
        if let Some(lamp) = self.call()?.button_lamps.get_mut(floor as usize) {
            lamp.set(call, on);
        }
        Ok(())
    }

    async fn set_floor_indicator(&mut self, floor: u8) -> Result<(), HardwareError> {
        self.call()?.floor_indicator = Some(floor);
        Ok(())
    }

    async fn set_door_lamp(&mut self, on: bool) -> Result<(), HardwareError> {
        self.call()?.door_lamp = on;
        Ok(())
    }

    async fn get_button_signals(&mut self) -> Result<Vec<ButtonSignal>, HardwareError> {
        let mut state = self.call()?;
        let n = state.pressed.len();
        Ok(std::mem::replace(&mut state.pressed, vec![ButtonSignal::default(); n]))
    }

    async fn get_floor_sensor(&mut self) -> Result<Option<u8>, HardwareError> {
        Ok(self.call()?.floor)
    }

    async fn get_obstruction_signal(&mut self) -> Result<bool, HardwareError> {
        Ok(self.call()?.obstruction)
    }

    async fn reload_config(&mut self) -> Result<(), HardwareError> {
        self.call()?.reloads += 1;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn presses_latch_until_read() {
        let (mut car, handle) = SimElevator::new(4, Some(0));
        handle.press(2, CallType::UP);

        let first = car.get_button_signals().await.unwrap();
        assert!(first[2].up);
        let second = car.get_button_signals().await.unwrap();
        assert!(!second[2].up);
    }

    #[tokio::test]
    async fn travel_follows_the_motor() {
        let (mut car, handle) = SimElevator::new(3, Some(1));
        assert_eq!(handle.travel_one_floor(), Some(1));

        car.set_motor_direction(Dirn::Up).await.unwrap();
        assert_eq!(handle.travel_one_floor(), Some(2));
        assert_eq!(handle.travel_one_floor(), Some(2));
        assert_eq!(car.get_floor_sensor().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn scripted_failures_run_out() {
        let (mut car, handle) = SimElevator::new(2, None);
        handle.fail_next(1);

        assert!(matches!(car.get_obstruction_signal().await, Err(HardwareError::Timeout(_))));
        assert_eq!(car.get_obstruction_signal().await.unwrap(), false);
    }
}
