//! Host runtime for replicated ability containers.
//!
//! `ability-core` is sans-IO; this crate supplies everything around it needed
//! to run one entity across several peers in-process and observe the result.
//!
//! Modules are organized by responsibility:
//! - [`simulation`] drives one authority and its clients over the loopback network
//! - [`network`] is the in-process transport with seeded reorder/drop faults
//! - [`events`] provides the topic-based event bus for container events
//! - [`scenario`] loads scripted simulations from RON
//! - [`config`] and [`logging`] cover configuration and tracing setup
pub mod api;
pub mod config;
pub mod events;
pub mod logging;
pub mod network;
pub mod scenario;
pub mod simulation;

pub use api::{Result, RuntimeError};
pub use config::{FaultConfig, SimulationConfig};
pub use events::{Event, EventBus, Topic};
pub use network::{Delivery, LoopbackNetwork, NetworkStats};
pub use scenario::{AbilitySpec, Scenario, ScenarioReport, Step, StepRecord};
pub use simulation::{AbilitySnapshot, PeerSnapshot, Simulation, SimulationBuilder};
