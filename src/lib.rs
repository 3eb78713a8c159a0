//! # This projects library
//!
//! A leaderless elevator fleet. Every node runs its own car, broadcasts its whole view of the
//! hall calls to every other node, and merges what it hears. Hall calls are handed out by
//! a distributed lock on the call itself; there is no master.
//!
//! ## Overview
//! - **config**: Constants, node configuration and print switches.
//! - **print**: Colored terminal logging and the fleet table.
//! - **init**: Command line arguments and homing of the car.
//! - **world_view**: One node's snapshot and the per-floor call table with its merge rules.
//! - **peer_registry**: Last-known snapshot and liveness of every node.
//! - **network**: Wire format, UDP transport to peers and an in-process loopback for tests.
//! - **elevio**: Interface for elevator I/O, over TCP or simulated.
//! - **elevator_logic**: Lock arbitration, the motion state machine and the control loop.

pub mod config;

pub mod print;

pub mod init;

pub mod world_view;

pub mod peer_registry;

pub mod network;

pub mod elevio;

pub mod elevator_logic;
