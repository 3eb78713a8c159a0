//! Simulated fleet: N nodes on a loopback network, each driving a simulated car.
//! Time is injected, one [config::POLL_PERIOD] per round.
#![allow(dead_code)]

use std::collections::BTreeSet;

use elevatorpeer::config::{self, NodeId};
use elevatorpeer::elevator_logic::ElevatorNode;
use elevatorpeer::elevio::sim::{SimElevator, SimHandle};
use elevatorpeer::elevio::{CallType, Dirn};
use elevatorpeer::network::loopback::{self, LinkSwitch, LoopbackTransport};
use elevatorpeer::world_view::{Direction, ElevatorBehaviour, NodeSnapshot};
use tokio::time::Instant;

pub const NUM_FLOORS: u8 = 4;

pub struct Fleet {
    pub nodes: Vec<ElevatorNode<SimElevator, LoopbackTransport>>,
    pub cars: Vec<SimHandle>,
    pub cables: Vec<LinkSwitch>,
    /// Cars that ignore their motor
    pub stalled: BTreeSet<usize>,
    /// Every (node, floor) where the door was seen open
    pub door_opened: BTreeSet<(usize, u8)>,
    pub start: Instant,
    pub now: Instant,
}

fn quiet() {
    for switch in [
        &config::PRINT_WV_ON,
        &config::PRINT_WARN_ON,
        &config::PRINT_OK_ON,
        &config::PRINT_INFO_ON,
        &config::PRINT_ELSE_ON,
    ] {
        *switch.lock().unwrap() = false;
    }
}

impl Fleet {
    /// One node per entry in `floors`, node `i` parked at `floors[i]`
    pub async fn new(floors: &[u8]) -> Fleet {
        quiet();
        let start = Instant::now();
        let mut nodes = Vec::new();
        let mut cars = Vec::new();
        let mut cables = Vec::new();

        for (i, transport) in loopback::fleet(floors.len()).into_iter().enumerate() {
            let (car, handle) = SimElevator::new(NUM_FLOORS, Some(floors[i]));
            cables.push(transport.link());
            let mut node = ElevatorNode::new(i as NodeId, floors.len(), NUM_FLOORS, car, transport, start).unwrap();
            node.start().await.unwrap();
            nodes.push(node);
            cars.push(handle);
        }

        Fleet {
            nodes,
            cars,
            cables,
            stalled: BTreeSet::new(),
            door_opened: BTreeSet::new(),
            start,
            now: start,
        }
    }

    pub fn local(&self, node: usize) -> &NodeSnapshot {
        self.nodes[node].registry().local()
    }

    /// Presses a hall or cab button on `node`'s panel
    pub fn press(&self, node: usize, floor: u8, call: CallType) {
        self.cars[node].press(floor, call);
    }

    /// One tick on every node, then every running car moves one floor
    pub async fn round(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.tick(self.now).await;
            let local = node.registry().local();
            if local.behaviour == ElevatorBehaviour::DoorOpen {
                self.door_opened.insert((i, local.current_floor));
            }
        }
        for (i, car) in self.cars.iter().enumerate() {
            if car.motor() != Dirn::Stop && !self.stalled.contains(&i) {
                car.travel_one_floor();
            }
        }
        self.now += config::POLL_PERIOD;
    }

    /// Runs rounds until `done` holds or `max_rounds` have passed. Returns whether `done` held.
    pub async fn run_until<F>(&mut self, max_rounds: usize, mut done: F) -> bool
    where
        F: FnMut(&Fleet) -> bool,
    {
        for _ in 0..max_rounds {
            self.round().await;
            if done(self) {
                return true;
            }
        }
        false
    }

    pub async fn run(&mut self, rounds: usize) {
        for _ in 0..rounds {
            self.round().await;
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.now - self.start
    }

    /// No node has the hall call in `dir` at `floor`, and every hall lamp for it is off
    pub fn hall_call_gone(&self, dir: Direction, floor: u8) -> bool {
        let call = CallType::from(dir);
        (0..self.nodes.len()).all(|i| {
            !self.local(i).floors[floor as usize].requested(dir) && !self.cars[i].button_lamp(floor, call)
        })
    }

    pub fn all_idle(&self) -> bool {
        (0..self.nodes.len()).all(|i| self.local(i).behaviour == ElevatorBehaviour::Idle)
    }
}
