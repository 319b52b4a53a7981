//! Local observer events emitted by a container.

use crate::ability::{AbilityKind, StateTransition};
use crate::buff::BuffCount;
use crate::cooldown::CooldownReadyReason;
use crate::tags::TagSet;

#[derive(Clone, Debug, PartialEq)]
pub enum SystemEvent {
    AbilityEquipped(AbilityKind),
    AbilityUnequipped(AbilityKind),
    StateChanged {
        ability: AbilityKind,
        transition: StateTransition,
    },
    CooldownStarted(AbilityKind),
    CooldownReady {
        ability: AbilityKind,
        reason: CooldownReadyReason,
    },
    BuffsApplied(Vec<BuffCount>),
    BuffsRemoved(Vec<BuffCount>),
    TagsChanged(TagSet),
}

impl SystemEvent {
    /// Ability this event concerns, if any.
    pub fn ability(&self) -> Option<&AbilityKind> {
        match self {
            Self::AbilityEquipped(ability)
            | Self::AbilityUnequipped(ability)
            | Self::CooldownStarted(ability)
            | Self::StateChanged { ability, .. }
            | Self::CooldownReady { ability, .. } => Some(ability),
            Self::BuffsApplied(_) | Self::BuffsRemoved(_) | Self::TagsChanged(_) => None,
        }
    }
}
