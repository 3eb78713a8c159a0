//! # Motion controller
//!
//! The per-node state machine `Idle -> Moving -> DoorOpen -> (Idle | Moving)`.
//! One [MotionController::step] per tick. Hardware outputs are issued as soon as a transition
//! is decided, so motor and door lamp match the snapshot that is broadcast next tick.
//!
//! Two timers:
//! - `door_timer`: how long the door stays open. Re-armed every tick the obstruction is active.
//! - `disable_timer`: the stuck watchdog. Reset on every floor change and on every door opening.
//!   When it runs out while moving or with the door open, the node marks itself `disabled`.
//!   This is a signal to the fleet, the motor keeps running.

use tokio::time::Instant;

use crate::config;
use crate::elevio::{self, Dirn, HardwareClient};
use crate::peer_registry::PeerRegistry;
use crate::print;
use crate::world_view::{Direction, ElevatorBehaviour};

use super::arbiter::{self, IdleChoice};
use super::timer;


/// Hardware readings of this tick that the state machine needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInputs {
    /// The floor sensor reports a floor (as opposed to between floors)
    pub at_floor: bool,
    /// The reported floor differs from last tick's `current_floor`
    pub floor_changed: bool,
    pub obstruction: bool,
}


pub struct MotionController {
    door_timer: timer::Timer,
    disable_timer: timer::Timer,
}

impl MotionController {
    pub fn new(now: Instant) -> Self {
        Self {
            door_timer: timer::new(config::DOOR_OPEN_DURATION, now),
            disable_timer: timer::new(config::STUCK_TIMEOUT, now),
        }
    }

    /// Runs the state machine once.
    ///
    /// ## Parameters
    /// - `registry`: Fleet state. Only the local snapshot is written, apart from lock owners
    ///   rewritten by [arbiter::verify_locked_floors].
    /// - `hw`: The car.
    /// - `inputs`: This tick's readings, already folded into the local snapshot by the caller.
    /// - `now`: Tick time.
    ///
    /// ## Behavior
    /// 1. `Moving`: stuck watchdog, then the stop gate if the car is at a floor. A car whose
    ///    target was pulled back to a floor with nothing to do stops there with the door closed.
    /// 2. `DoorOpen`: watchdog, obstruction, and completion when the door timer has run out.
    /// 3. Not idle: claim calls along the way and extend the target.
    /// 4. `Idle`: pick the next job.
    pub async fn step<H: HardwareClient>(
        &mut self,
        registry: &mut PeerRegistry,
        hw: &mut H,
        inputs: &TickInputs,
        now: Instant,
    ) {
        if registry.local().behaviour == ElevatorBehaviour::Moving {
            self.watch_progress(registry, inputs, now);
            if inputs.at_floor {
                let local = registry.local();
                if local.current_floor == local.target_floor && !arbiter::is_committed(registry, local.current_floor) {
                    halt(registry, hw).await;
                } else if arbiter::floor_is_locked(registry) {
                    self.on_floor_arrival(registry, hw, now).await;
                }
            }
        }

        if registry.local().behaviour == ElevatorBehaviour::DoorOpen {
            self.on_door_open(registry, hw, inputs, now).await;
        }

        if registry.local().behaviour != ElevatorBehaviour::Idle {
            arbiter::extend_sweep(registry);
        } else {
            self.on_idle(registry, hw, now).await;
        }
    }

    /// Stuck watchdog while moving
    fn watch_progress(&mut self, registry: &mut PeerRegistry, inputs: &TickInputs, now: Instant) {
        let local = registry.local_mut();
        if inputs.floor_changed {
            self.disable_timer.timer_start(now);
            if local.disabled {
                print::ok(format!("Heisen rører seg igjen (etasje {})", local.current_floor));
            }
            local.disabled = false;
        } else if self.disable_timer.timer_timeouted(now) {
            mark_disabled(registry);
        }
    }

    async fn on_floor_arrival<H: HardwareClient>(&mut self, registry: &mut PeerRegistry, hw: &mut H, now: Instant) {
        elevio::report(hw.set_motor_direction(Dirn::Stop).await, "motor stop");
        print::info(format!("Stopper i etasje {}", registry.local().current_floor));
        self.open_door(registry, hw, now).await;
    }

    async fn open_door<H: HardwareClient>(&mut self, registry: &mut PeerRegistry, hw: &mut H, now: Instant) {
        registry.local_mut().behaviour = ElevatorBehaviour::DoorOpen;
        elevio::report(hw.set_door_lamp(true).await, "door lamp");
        self.door_timer.timer_start(now);
        self.disable_timer.timer_start(now);
    }

    async fn on_door_open<H: HardwareClient>(
        &mut self,
        registry: &mut PeerRegistry,
        hw: &mut H,
        inputs: &TickInputs,
        now: Instant,
    ) {
        if self.disable_timer.timer_timeouted(now) {
            mark_disabled(registry);
        }

        if inputs.obstruction {
            // Døra lukkar seg aldri så lenge noko står i vegen
            self.door_timer.timer_start(now);
            return;
        }
        if !self.door_timer.timer_timeouted(now) {
            return;
        }

        self.door_timer.timer_stop();
        complete_order(registry, hw).await;

        let local = registry.local();
        match Direction::towards(local.current_floor, local.target_floor) {
            None => {
                registry.local_mut().behaviour = ElevatorBehaviour::Idle;
            }
            Some(dir) => self.start_moving(registry, hw, dir, now).await,
        }
    }

    async fn start_moving<H: HardwareClient>(
        &mut self,
        registry: &mut PeerRegistry,
        hw: &mut H,
        towards: Direction,
        now: Instant,
    ) {
        let local = registry.local_mut();
        local.behaviour = ElevatorBehaviour::Moving;
        print::info(format!("Køyrer frå {} mot {}", local.current_floor, local.target_floor));
        self.disable_timer.timer_start(now);
        elevio::report(hw.set_motor_direction(Dirn::from(towards)).await, "motor direction");
    }

    async fn on_idle<H: HardwareClient>(&mut self, registry: &mut PeerRegistry, hw: &mut H, now: Instant) {
        let local = registry.local_mut();
        local.target_floor = local.current_floor;

        match arbiter::choose_idle_target(registry) {
            IdleChoice::Stay => {}
            IdleChoice::Claimed { floor, direction } => {
                print::info(format!("Låste {:?}-kall i etasje {}, ventar på semje", direction, floor));
            }
            IdleChoice::Serve { floor, direction } => {
                let local = registry.local_mut();
                local.target_floor = floor;
                local.direction = direction;
                match Direction::towards(local.current_floor, floor) {
                    None => self.open_door(registry, hw, now).await,
                    Some(dir) => self.start_moving(registry, hw, dir, now).await,
                }
            }
        }
    }
}

/// Stops the motor without opening the door
async fn halt<H: HardwareClient>(registry: &mut PeerRegistry, hw: &mut H) {
    elevio::report(hw.set_motor_direction(Dirn::Stop).await, "motor stop");
    let local = registry.local_mut();
    local.behaviour = ElevatorBehaviour::Idle;
    print::info(format!("Ingenting å gjere i etasje {}, stoppar", local.current_floor));
}

fn mark_disabled(registry: &mut PeerRegistry) {
    let local = registry.local_mut();
    if !local.disabled {
        print::warn(format!(
            "Ingen framgang på {:?}, markerer noden som disabled",
            config::STUCK_TIMEOUT
        ));
    }
    local.disabled = true;
}

/// Finishes the stop at the current floor.
///
/// Turns the door lamp off, clears the cab call here, releases the hall call in our service
/// direction if we own it, and clears `disabled`. Lamps for the cleared bits are updated by
/// the caller's lamp delta.
pub async fn complete_order<H: HardwareClient>(registry: &mut PeerRegistry, hw: &mut H) {
    let me = registry.self_index();
    let local = registry.local_mut();
    local.disabled = false;
    elevio::report(hw.set_door_lamp(false).await, "door lamp");

    let dir = local.direction;
    if let Some(record) = local.floors.get_mut(local.current_floor as usize) {
        record.cab_requested = false;
        if record.owner(dir) == Some(me) {
            record.release(dir);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevio::sim::{SimElevator, SimHandle};
    use std::time::Duration;

    fn single(floor: u8) -> (PeerRegistry, MotionController, SimElevator, SimHandle, Instant) {
        let now = Instant::now();
        let mut reg = PeerRegistry::new(0, 1, 4, now).unwrap();
        reg.local_mut().current_floor = floor;
        reg.local_mut().target_floor = floor;
        let (car, handle) = SimElevator::new(4, Some(floor));
        (reg, MotionController::new(now), car, handle, now)
    }

    const AT_FLOOR: TickInputs = TickInputs { at_floor: true, floor_changed: false, obstruction: false };

    #[tokio::test]
    async fn cab_call_drives_the_car_and_opens_the_door() {
        let (mut reg, mut fsm, mut car, handle, t0) = single(0);
        reg.local_mut().floors[2].cab_requested = true;

        fsm.step(&mut reg, &mut car, &AT_FLOOR, t0).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::Moving);
        assert_eq!(reg.local().target_floor, 2);
        assert_eq!(handle.motor(), Dirn::Up);

        reg.local_mut().current_floor = 1;
        let passing = TickInputs { floor_changed: true, ..AT_FLOOR };
        fsm.step(&mut reg, &mut car, &passing, t0 + Duration::from_secs(1)).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::Moving);

        reg.local_mut().current_floor = 2;
        let t_arrive = t0 + Duration::from_secs(2);
        fsm.step(&mut reg, &mut car, &passing, t_arrive).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::DoorOpen);
        assert_eq!(handle.motor(), Dirn::Stop);
        assert!(handle.door_lamp());

        fsm.step(&mut reg, &mut car, &AT_FLOOR, t_arrive + Duration::from_secs(3)).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::DoorOpen);

        fsm.step(&mut reg, &mut car, &AT_FLOOR, t_arrive + Duration::from_millis(3001)).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::Idle);
        assert!(!handle.door_lamp());
        assert!(!reg.local().floors[2].cab_requested);
    }

    #[tokio::test]
    async fn obstruction_holds_the_door() {
        let (mut reg, mut fsm, mut car, handle, t0) = single(1);
        reg.local_mut().floors[1].cab_requested = true;
        fsm.step(&mut reg, &mut car, &AT_FLOOR, t0).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::DoorOpen);

        let blocked = TickInputs { obstruction: true, ..AT_FLOOR };
        let mut t = t0;
        for _ in 0..500 {
            t += Duration::from_millis(20);
            fsm.step(&mut reg, &mut car, &blocked, t).await;
            assert_eq!(reg.local().behaviour, ElevatorBehaviour::DoorOpen);
            assert!(handle.door_lamp());
        }

        fsm.step(&mut reg, &mut car, &AT_FLOOR, t + Duration::from_secs(2)).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::DoorOpen);
        fsm.step(&mut reg, &mut car, &AT_FLOOR, t + Duration::from_secs(4)).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::Idle);
    }

    #[tokio::test]
    async fn long_obstruction_marks_disabled_until_completion() {
        let (mut reg, mut fsm, mut car, _handle, t0) = single(1);
        reg.local_mut().floors[1].cab_requested = true;
        fsm.step(&mut reg, &mut car, &AT_FLOOR, t0).await;

        let blocked = TickInputs { obstruction: true, ..AT_FLOOR };
        fsm.step(&mut reg, &mut car, &blocked, t0 + Duration::from_secs(9)).await;
        assert!(reg.local().disabled);

        let t_clear = t0 + Duration::from_secs(13);
        fsm.step(&mut reg, &mut car, &AT_FLOOR, t_clear).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::Idle);
        assert!(!reg.local().disabled);
    }

    #[tokio::test]
    async fn stuck_car_is_disabled_but_keeps_its_motor() {
        let (mut reg, mut fsm, mut car, handle, t0) = single(0);
        reg.local_mut().floors[3].cab_requested = true;
        fsm.step(&mut reg, &mut car, &AT_FLOOR, t0).await;

        let between = TickInputs::default();
        fsm.step(&mut reg, &mut car, &between, t0 + Duration::from_secs(8)).await;
        assert!(!reg.local().disabled);

        fsm.step(&mut reg, &mut car, &between, t0 + Duration::from_millis(8001)).await;
        assert!(reg.local().disabled);
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::Moving);
        assert_eq!(handle.motor(), Dirn::Up);

        reg.local_mut().current_floor = 1;
        let moved = TickInputs { at_floor: true, floor_changed: true, obstruction: false };
        fsm.step(&mut reg, &mut car, &moved, t0 + Duration::from_secs(9)).await;
        assert!(!reg.local().disabled);
    }

    #[tokio::test]
    async fn car_without_a_job_at_its_target_stops_with_the_door_closed() {
        let (mut reg, mut fsm, mut car, handle, t0) = single(0);
        reg.local_mut().floors[2].cab_requested = true;
        fsm.step(&mut reg, &mut car, &AT_FLOOR, t0).await;
        assert_eq!(handle.motor(), Dirn::Up);

        // Job gone, target pulled back to where the car now stands
        {
            let local = reg.local_mut();
            local.floors[2].cab_requested = false;
            local.current_floor = 1;
            local.target_floor = 1;
        }
        let passing = TickInputs { floor_changed: true, ..AT_FLOOR };
        fsm.step(&mut reg, &mut car, &passing, t0 + Duration::from_secs(1)).await;

        assert_eq!(reg.local().behaviour, ElevatorBehaviour::Idle);
        assert_eq!(handle.motor(), Dirn::Stop);
        assert!(!handle.door_lamp());
    }

    #[tokio::test]
    async fn completion_releases_only_our_own_lock() {
        let (mut reg, _fsm, mut car, _handle, _) = single(2);
        {
            let local = reg.local_mut();
            local.direction = Direction::Down;
            local.floors[2].hall_down_requested = true;
            local.floors[2].lock(Direction::Down, Some(0));
            local.floors[2].hall_up_requested = true;
            local.floors[2].lock(Direction::Up, Some(0));
        }

        complete_order(&mut reg, &mut car).await;

        let here = reg.local().floors[2];
        assert!(!here.hall_down_requested && !here.hall_down_locked);
        assert!(here.hall_up_requested && here.hall_up_locked);
    }

    #[tokio::test]
    async fn hardware_errors_do_not_stop_the_machine() {
        let (mut reg, mut fsm, mut car, handle, t0) = single(0);
        reg.local_mut().floors[1].cab_requested = true;
        handle.fail_next(1);

        fsm.step(&mut reg, &mut car, &AT_FLOOR, t0).await;
        assert_eq!(reg.local().behaviour, ElevatorBehaviour::Moving);
        assert_eq!(handle.motor(), Dirn::Stop);
    }
}
