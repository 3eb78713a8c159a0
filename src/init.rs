//! ## Start-up
//!
//! - [parse_args]: command line arguments in `key::value` form into a [NodeConfig].
//! - [home]: brings the car to a known floor before the control loop starts.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Mutex;

use anyhow::{bail, Context};
use tokio::time::{sleep, Instant};

use crate::config::{self, NodeConfig, NodeId};
use crate::elevio::{self, Dirn, HardwareClient};
use crate::print;


/// What the process should do after reading its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartMode {
    Run(NodeConfig),
    Help,
}

fn set_switch(switch: &Mutex<bool>, on: bool) {
    *switch.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = on;
}

fn parse_peers(value: &str) -> anyhow::Result<Vec<SocketAddr>> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<SocketAddr>().with_context(|| format!("ugyldig peer-adresse '{}'", s)))
        .collect()
}

/// Reads command line arguments.
///
/// ## Parameters
/// - `args`: The full argument list, program name first (as from `std::env::args()`).
///
/// ## Accepted arguments
/// - `id::N`: this node's index (default 0)
/// - `peers::ip:port,ip:port,...`: every node's UDP endpoint, ordered by index (default three nodes on localhost)
/// - `elevator::ip:port`: elevator server (default `127.0.0.1:15657 + id`)
/// - `floors::N`: number of floors (default [config::DEFAULT_NUM_FLOORS])
/// - `print_wv::true/false`, `print_err::..`, `print_warn::..`, `print_ok::..`, `print_info::..`, `print_else::..`
/// - `debug`: only error messages
/// - `help`
///
/// ## Returns
/// - [StartMode::Help] if `help` was given, otherwise the validated config.
/// - An error for unparsable values, an index outside the peer list, or fewer than two floors.
///
/// # Notes
/// The print switches in [config] are set as a side effect.
pub fn parse_args(args: &[String]) -> anyhow::Result<StartMode> {
    let mut index: NodeId = 0;
    let mut peers: Option<Vec<SocketAddr>> = None;
    let mut elevator: Option<SocketAddr> = None;
    let mut num_floors = config::DEFAULT_NUM_FLOORS;

    for arg in args.iter().skip(1) {
        let parts: Vec<&str> = arg.splitn(2, "::").collect();
        if parts.len() == 2 {
            let key = parts[0].to_lowercase();
            let value = parts[1];
            let is_true = value.to_lowercase() == "true";

            match key.as_str() {
                "id" => index = value.parse().with_context(|| format!("ugyldig id '{}'", value))?,
                "peers" => peers = Some(parse_peers(value)?),
                "elevator" => {
                    elevator = Some(value.parse().with_context(|| format!("ugyldig heisserver-adresse '{}'", value))?)
                }
                "floors" => num_floors = value.parse().with_context(|| format!("ugyldig etasjetal '{}'", value))?,
                "print_wv" => set_switch(&config::PRINT_WV_ON, is_true),
                "print_err" => set_switch(&config::PRINT_ERR_ON, is_true),
                "print_warn" => set_switch(&config::PRINT_WARN_ON, is_true),
                "print_ok" => set_switch(&config::PRINT_OK_ON, is_true),
                "print_info" => set_switch(&config::PRINT_INFO_ON, is_true),
                "print_else" => set_switch(&config::PRINT_ELSE_ON, is_true),
                _ => print::warn(format!("Ukjent argument '{}' blir ignorert", arg)),
            }
        } else {
            match arg.to_lowercase().as_str() {
                "help" => return Ok(StartMode::Help),
                "debug" => {
                    // Debug modus: Kun error-meldingar
                    set_switch(&config::PRINT_WV_ON, false);
                    set_switch(&config::PRINT_WARN_ON, false);
                    set_switch(&config::PRINT_OK_ON, false);
                    set_switch(&config::PRINT_INFO_ON, false);
                    set_switch(&config::PRINT_ELSE_ON, false);
                }
                _ => print::warn(format!("Ukjent argument '{}' blir ignorert", arg)),
            }
        }
    }

    if index > config::MAX_NODE_ID {
        bail!("id {} er større enn {}", index, config::MAX_NODE_ID);
    }
    if num_floors < 2 {
        bail!("treng minst 2 etasjar, fekk {}", num_floors);
    }

    let defaults = NodeConfig::local_default(index);
    let peers = peers.unwrap_or(defaults.peers);
    if index as usize >= peers.len() {
        bail!("id {} finst ikkje i peer-lista ({} nodar)", index, peers.len());
    }

    Ok(StartMode::Run(NodeConfig {
        index,
        peers,
        elevator_addr: elevator.unwrap_or(defaults.elevator_addr),
        num_floors,
    }))
}

pub fn print_help() {
    println!("Tilgjengelige argument:");
    println!("  id::N                       (indeks til denne noden, standard 0)");
    println!("  peers::ip:port,ip:port,...  (alle nodar i flåten, sortert etter indeks)");
    println!(
        "  elevator::ip:port           (heisserver, standard {}:{}+id)",
        Ipv4Addr::LOCALHOST,
        config::ELEVATOR_SERVER_BASE_PORT
    );
    println!("  floors::N                   (standard {})", config::DEFAULT_NUM_FLOORS);
    println!("  print_wv::true/false");
    println!("  print_err::true/false");
    println!("  print_warn::true/false");
    println!("  print_ok::true/false");
    println!("  print_info::true/false");
    println!("  print_else::true/false");
    println!("  debug (kun error-meldingar vises)");
}


/// Brings the car to a known floor.
///
/// ## Behavior
/// - Reloads the elevator server config.
/// - If the floor sensor reports a floor, the motor is stopped and that floor is returned.
/// - Otherwise the car is driven down, polling every [config::POLL_PERIOD], until a floor is
///   reached or [config::HOMING_TIMEOUT] has passed.
///
/// ## Returns
/// - The floor the car stands at, with the motor stopped and the floor indicator set.
/// - An error if no floor was found in time. The motor is stopped in that case too.
pub async fn home<H: HardwareClient>(hw: &mut H) -> anyhow::Result<u8> {
    elevio::report(hw.reload_config().await, "reload config");

    let deadline = Instant::now() + config::HOMING_TIMEOUT;
    let mut driving = false;
    loop {
        if let Some(Some(floor)) = elevio::report(hw.get_floor_sensor().await, "floor sensor") {
            elevio::report(hw.set_motor_direction(Dirn::Stop).await, "motor stop");
            elevio::report(hw.set_floor_indicator(floor).await, "floor indicator");
            return Ok(floor);
        }

        if Instant::now() >= deadline {
            elevio::report(hw.set_motor_direction(Dirn::Stop).await, "motor stop");
            bail!("fann ingen etasje innan {:?}", config::HOMING_TIMEOUT);
        }

        if !driving {
            print::info("Mellom etasjar, køyrer ned til næraste etasje".to_string());
            elevio::report(hw.set_motor_direction(Dirn::Down).await, "motor direction");
            driving = true;
        }
        sleep(config::POLL_PERIOD).await;
    }
}

/// Loopback address on `port`. Handy for building peer lists by hand.
pub fn localhost(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
}
