//! ## Elevator logic
//!
//! One control loop per node. [ElevatorNode::tick] is the whole protocol for one tick:
//!
//! 1. Poll buttons, floor sensor and obstruction, OR them into the local snapshot.
//! 2. Broadcast the local snapshot to every peer.
//! 3. Drain incoming snapshots into the [PeerRegistry], merge live peers' call bits, and pull
//!    the target back if a call it was set for was lost to another node.
//! 4. Run the [arbiter] and the motion state machine ([fsm]).
//! 5. Update lamps for whatever changed since the previous tick.
//!
//! The loop owns all its state; nothing is shared with other tasks.

pub mod arbiter;
pub mod fsm;
pub mod lights;
pub mod timer;

use ansi_term::Colour;
use anyhow::Context;
use tokio::time::{sleep, Instant};

use crate::config::{self, NodeConfig, NodeId};
use crate::elevio::{self, elev::ElevatorClient, HardwareClient};
use crate::init;
use crate::network::{udp_peer::UdpPeerTransport, NetworkError, PeerTransport};
use crate::peer_registry::PeerRegistry;
use crate::print;
use crate::world_view::{floor_table, ElevatorBehaviour};


/// A node: its car, its link to the fleet, and everything it believes.
pub struct ElevatorNode<H: HardwareClient, T: PeerTransport> {
    hw: H,
    transport: T,
    registry: PeerRegistry,
    motion: fsm::MotionController,
    obstruction: bool,
    broadcast_failed_count: u32,
    last_fleet_print: Option<Instant>,
}

impl<H: HardwareClient, T: PeerTransport> ElevatorNode<H, T> {
    /// Creates node `index` in a fleet of `node_count` nodes.
    ///
    /// ## Returns
    /// - [NetworkError::BadIndex] if `index` is outside the fleet.
    pub fn new(
        index: NodeId,
        node_count: usize,
        num_floors: u8,
        hw: H,
        transport: T,
        now: Instant,
    ) -> Result<Self, NetworkError> {
        Ok(Self {
            hw,
            transport,
            registry: PeerRegistry::new(index, node_count, num_floors, now)?,
            motion: fsm::MotionController::new(now),
            obstruction: false,
            broadcast_failed_count: 0,
            last_fleet_print: None,
        })
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of broadcasts in a row that failed to reach at least one peer
    pub fn broadcast_failed_count(&self) -> u32 {
        self.broadcast_failed_count
    }

    /// Homes the car and sets every lamp from the (empty) local table. Call once before ticking.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let floor = init::home(&mut self.hw).await.context("homing failed")?;

        let local = self.registry.local_mut();
        local.current_floor = floor;
        local.target_floor = floor;
        local.behaviour = ElevatorBehaviour::Idle;
        lights::set_all_lights(&mut self.hw, self.registry.local()).await;

        print::ok(format!("Node {} klar i etasje {}", self.registry.self_index(), floor));
        Ok(())
    }

    /// One pass through the control loop at time `now`.
    pub async fn tick(&mut self, now: Instant) {
        let before = self.registry.local().clone();

        let inputs = self.poll_hardware().await;

        self.registry.touch_self(now);
        self.broadcast();
        self.receive(now);
        arbiter::merge_live_peers(&mut self.registry);
        if let Some(target) = arbiter::drop_lost_target(&mut self.registry) {
            print::color(format!("Mista låsen på målet, nytt mål er etasje {}", target), Colour::RGB(255, 51, 255));
        }

        self.motion.step(&mut self.registry, &mut self.hw, &inputs, now).await;

        lights::update_lights(&mut self.hw, &before, self.registry.local()).await;
        self.print_fleet(now);
    }

    /// Reads this tick's inputs and folds them into the local snapshot.
    /// A failed read leaves the previous value in place.
    async fn poll_hardware(&mut self) -> fsm::TickInputs {
        if let Some(signals) = elevio::report(self.hw.get_button_signals().await, "button signals") {
            floor_table::register_buttons(&mut self.registry.local_mut().floors, &signals);
        }

        let mut inputs = fsm::TickInputs::default();
        if let Some(Some(floor)) = elevio::report(self.hw.get_floor_sensor().await, "floor sensor") {
            let local = self.registry.local_mut();
            if floor < local.num_floors() {
                inputs.at_floor = true;
                inputs.floor_changed = floor != local.current_floor;
                local.current_floor = floor;
            } else {
                print::warn(format!("Floor sensor reported floor {} outside 0..{}", floor, local.num_floors()));
            }
        }

        if let Some(obstruction) = elevio::report(self.hw.get_obstruction_signal().await, "obstruction") {
            self.obstruction = obstruction;
        }
        inputs.obstruction = self.obstruction;
        inputs
    }

    fn broadcast(&mut self) {
        match self.transport.broadcast(self.registry.local()) {
            Ok(()) => {
                if self.broadcast_failed_count > 0 {
                    print::ok(format!("Broadcast virkar igjen etter {} feil", self.broadcast_failed_count));
                }
                self.broadcast_failed_count = 0;
            }
            Err(e) => {
                self.broadcast_failed_count += 1;
                // Ikkje spam terminalen ein gong per tick
                if self.broadcast_failed_count == 1 || self.broadcast_failed_count % 100 == 0 {
                    print::err(format!("Broadcast feila ({} på rad): {}", self.broadcast_failed_count, e));
                }
            }
        }
    }

    fn receive(&mut self, now: Instant) {
        for (sender, snapshot) in self.transport.poll_incoming() {
            if let Err(e) = self.registry.record(sender, snapshot, now) {
                print::warn(format!("Forkasta snapshot frå node {}: {}", sender, e));
            }
        }
    }

    fn print_fleet(&mut self, now: Instant) {
        if !print::enabled(&config::PRINT_WV_ON) {
            return;
        }
        let due = self
            .last_fleet_print
            .map_or(true, |last| now.saturating_duration_since(last) >= config::PRINT_FLEET_PERIOD);
        if due {
            print::fleet(&self.registry);
            self.last_fleet_print = Some(now);
        }
    }
}


/// Runs node `cfg.index` against the elevator server and the UDP fleet. Never returns
/// under normal operation.
///
/// ## Returns
/// - An error only if start-up fails: elevator server unreachable, socket not bindable,
///   or the car could not be homed.
pub async fn run(cfg: NodeConfig) -> anyhow::Result<()> {
    let hw = ElevatorClient::connect(cfg.elevator_addr, cfg.num_floors)
        .await
        .with_context(|| format!("could not reach elevator server at {}", cfg.elevator_addr))?;

    let transport = UdpPeerTransport::bind(cfg.index, cfg.peers.clone())
        .with_context(|| format!("could not bind peer socket for node {}", cfg.index))?;

    let mut node = ElevatorNode::new(
        cfg.index,
        cfg.node_count(),
        cfg.num_floors,
        hw,
        transport,
        Instant::now(),
    )?;
    node.start().await?;

    loop {
        node.tick(Instant::now()).await;
        sleep(config::POLL_PERIOD).await;
    }
}
