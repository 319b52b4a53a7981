use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Lifecycle and execution state of an equipped ability.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
pub enum AbilityState {
    /// Created but not attached to a container yet.
    #[default]
    BeforeBeginPlay,
    /// Equipped and idle.
    JustEquipped,
    Cancelled,
    Succeeded,
    Cast,
    Activation,
    /// Detached from its container. Terminal.
    AfterEndPlay,
}

impl AbilityState {
    /// Casting or activated.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Cast | Self::Activation)
    }

    /// Idle after a previous run.
    pub const fn has_finished(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded)
    }

    /// Destinations no ability may ever request once play has begun.
    pub const fn is_lifecycle(self) -> bool {
        matches!(self, Self::BeforeBeginPlay | Self::AfterEndPlay)
    }
}

bitflags! {
    /// Modifiers carried with a state transition.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TransitionFlags: u8 {
        /// Exiting activation starts the cooldown (for `OnDeactivation` policies).
        const START_COOLDOWN    = 1 << 0;
        /// The authority refused a predicted transition; run recovery effects.
        const PREDICTION_FAILED = 1 << 1;
    }
}

/// A move between two ability states.
///
/// Equality and hashing only consider `(origin, destination)`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StateTransition {
    pub origin: AbilityState,
    pub destination: AbilityState,
    pub flags: TransitionFlags,
}

impl StateTransition {
    pub const fn new(origin: AbilityState, destination: AbilityState) -> Self {
        Self {
            origin,
            destination,
            flags: TransitionFlags::empty(),
        }
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: TransitionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub const fn prediction_failed(&self) -> bool {
        self.flags.contains(TransitionFlags::PREDICTION_FAILED)
    }

    pub const fn starts_cooldown(&self) -> bool {
        self.flags.contains(TransitionFlags::START_COOLDOWN)
    }
}

impl PartialEq for StateTransition {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.destination == other.destination
    }
}

impl Eq for StateTransition {}

impl core::hash::Hash for StateTransition {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
        self.destination.hash(state);
    }
}

impl core::fmt::Display for StateTransition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)?;
        if !self.flags.is_empty() {
            write!(f, " {:?}", self.flags)?;
        }
        Ok(())
    }
}
