//! Abilities: state, static configuration, behaviour hooks and the type registry.

mod behavior;
mod config;
mod machine;
mod registry;
mod state;

pub use behavior::{AbilityBehavior, AbilityCommand, AbilityContext, AbilityView, DefaultBehavior};
pub use config::{AbilityConfig, CooldownMode, CooldownPolicy, InterruptConfig, TickPolicy};
pub use machine::AbilityMachine;
pub use registry::{AbilityKind, AbilityRegistry, AbilityType};
pub use state::{AbilityState, StateTransition, TransitionFlags};
