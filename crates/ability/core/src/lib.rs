//! Replicated gameplay abilities and buffs.
//!
//! `ability-core` defines the per-entity [`AbilitySystem`] container: equipped
//! abilities with their predictive state machines, input routing, the entity
//! tag set, the buff ledger and the cooldown/lifetime timer tables. The crate
//! performs no I/O; replication traffic flows through [`net::Outbox`] and
//! [`AbilitySystem::receive`], and time advances through
//! [`AbilitySystem::tick`].
pub mod ability;
pub mod buff;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod events;
pub mod input;
pub mod net;
pub mod payload;
pub mod system;
pub mod tags;
pub mod time;

mod name;

pub use ability::{
    AbilityBehavior, AbilityCommand, AbilityConfig, AbilityContext, AbilityKind, AbilityMachine,
    AbilityRegistry, AbilityState, AbilityType, AbilityView, CooldownMode, CooldownPolicy,
    DefaultBehavior, InterruptConfig, StateTransition, TickPolicy, TransitionFlags,
};
pub use buff::{
    BuffCatalog, BuffClass, BuffCount, BuffCountWire, BuffDef, BuffEffects, BuffId, BuffLedger,
    BuffMatch, BuffOperation, BuffRef, EffectContext,
};
pub use config::{BuffReplication, CoreConfig};
pub use cooldown::{CooldownReadyReason, CooldownTable};
pub use error::{
    CoreError, ErrorSeverity, GuardFailure, LedgerError, PayloadError, ProtocolError,
    TransitionError,
};
pub use events::SystemEvent;
pub use input::{CancelInputResult, InputProfile, InputSlot};
pub use net::{Envelope, NetMessage, NetRole, Outbox, PeerId, Route};
pub use payload::{Payload, PayloadBag};
pub use system::{AbilityInfo, AbilitySystem, AbilitySystemBuilder};
pub use tags::{Tag, TagDelta, TagSet};
pub use time::{GameTime, TimerHandle, TimerManager};
