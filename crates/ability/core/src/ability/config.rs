//! Static, data-driven configuration of an ability type.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::input::InputProfile;
use crate::tags::{TagDelta, TagSet};

/// When the ability receives `tick` callbacks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TickPolicy {
    #[default]
    Never,
    /// From begin play to end play.
    Always,
    WhileCasting,
    WhileActivated,
    WhileCastingOrActivated,
}

impl TickPolicy {
    pub const fn includes_cast(self) -> bool {
        matches!(self, Self::WhileCasting | Self::WhileCastingOrActivated)
    }

    pub const fn includes_activation(self) -> bool {
        matches!(self, Self::WhileActivated | Self::WhileCastingOrActivated)
    }
}

/// Which edge starts the cooldown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CooldownMode {
    /// Entering activation.
    #[default]
    OnActivation,
    /// Leaving activation with `START_COOLDOWN`.
    OnDeactivation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CooldownPolicy {
    pub duration: Duration,
    #[serde(default)]
    pub mode: CooldownMode,
    /// A held input re-issues its press action once the cooldown is over.
    #[serde(default)]
    pub input_waits_for_cooldown: bool,
}

/// Tags that interrupt a running ability when they appear on the entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptConfig {
    pub tags: TagSet,
    pub cancels_casting: bool,
    pub cancels_activation: bool,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            tags: TagSet::new(),
            cancels_casting: false,
            cancels_activation: true,
        }
    }
}

/// Static configuration shared by every instance of an ability type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityConfig {
    /// Human-readable name, used by `AbilitySystem::ability_by_name`.
    pub name: String,
    pub has_cast: bool,
    pub tick: TickPolicy,

    /// Entity must carry all of these to cast or activate.
    pub required_tags: TagSet,
    /// Entity must carry none of these to cast or activate.
    pub blocked_tags: TagSet,

    pub cast_start_tags: TagDelta,
    pub cast_finish_tags: TagDelta,
    pub activation_tags: TagDelta,
    pub deactivation_tags: TagDelta,

    pub interrupt: InterruptConfig,
    pub cooldown: Option<CooldownPolicy>,
    pub input: InputProfile,

    /// After a refused prediction out of activation, re-enter `Cast`.
    pub resume_cast_on_failed_prediction: bool,
}

impl AbilityConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A positive cooldown is configured.
    pub fn has_cooldown(&self) -> bool {
        self.cooldown_duration() > Duration::ZERO
    }

    pub fn cooldown_duration(&self) -> Duration {
        self.cooldown.map(|c| c.duration).unwrap_or_default()
    }

    pub fn cooldown_mode(&self) -> Option<CooldownMode> {
        self.cooldown.map(|c| c.mode)
    }

    pub fn input_waits_for_cooldown(&self) -> bool {
        self.cooldown.is_some_and(|c| c.input_waits_for_cooldown)
    }
}
