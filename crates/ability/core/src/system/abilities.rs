//! Equipping abilities, queries and the gameplay verbs.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{AbilityInfo, AbilitySlot, AbilitySystem};
use crate::ability::{
    AbilityBehavior, AbilityConfig, AbilityKind, AbilityMachine, AbilityState, DefaultBehavior,
    StateTransition, TransitionFlags,
};
use crate::error::ProtocolError;
use crate::events::SystemEvent;
use crate::net::{NetMessage, Route};
use crate::payload::PayloadBag;

impl AbilitySystem {
    // ========================================================================
    // Equip / unequip
    // ========================================================================

    /// Equips one instance of `kind`. Authority only; equipping twice is a no-op.
    pub fn equip_ability(&mut self, kind: &AbilityKind) -> bool {
        if !self.role.authority {
            debug!(target: "ability::state", ability = %kind, "equip requires authority");
            return false;
        }
        if self.abilities.contains_key(kind) {
            return false;
        }
        if let Err(err) = self.install_ability(kind) {
            debug!(target: "ability::state", %err, "equip ignored");
            return false;
        }
        self.outbox.push(
            Route::AllPeers,
            NetMessage::AbilityEquipped {
                ability: kind.clone(),
            },
        );
        true
    }

    /// Equips every ability of `kinds`, returning how many were newly equipped.
    pub fn equip_abilities(&mut self, kinds: impl IntoIterator<Item = AbilityKind>) -> usize {
        kinds
            .into_iter()
            .filter(|kind| self.equip_ability(kind))
            .count()
    }

    /// Unequips `kind`, ending its play first. Authority only.
    pub fn unequip_ability(&mut self, kind: &AbilityKind) -> bool {
        if !self.role.authority {
            debug!(target: "ability::state", ability = %kind, "unequip requires authority");
            return false;
        }
        if !self.uninstall_ability(kind) {
            return false;
        }
        self.outbox.push(
            Route::AllPeers,
            NetMessage::AbilityUnequipped {
                ability: kind.clone(),
            },
        );
        true
    }

    pub fn unequip_abilities(&mut self, kinds: impl IntoIterator<Item = AbilityKind>) -> usize {
        kinds
            .into_iter()
            .filter(|kind| self.unequip_ability(kind))
            .count()
    }

    pub fn unequip_all(&mut self) -> usize {
        let kinds = self.equipped_abilities();
        self.unequip_abilities(kinds)
    }

    /// Instantiates `kind` from the registry and begins its play.
    pub(super) fn install_ability(&mut self, kind: &AbilityKind) -> Result<(), ProtocolError> {
        let ability_type = self
            .registry
            .get(kind)
            .ok_or_else(|| ProtocolError::UnregisteredAbility(kind.clone()))?;
        let config = Arc::clone(ability_type.config());
        let behavior = ability_type.instantiate();

        self.abilities.insert(
            kind.clone(),
            AbilitySlot {
                machine: AbilityMachine::new(config.has_cast),
                config,
                behavior: Some(behavior),
            },
        );
        info!(target: "ability::state", peer = %self.peer, ability = %kind, "ability equipped");
        self.events.push_back(SystemEvent::AbilityEquipped(kind.clone()));

        if let Some(machine) = self.machine_mut(kind) {
            machine.force_state(AbilityState::JustEquipped);
        }
        self.with_behavior(kind, |behavior, ctx| behavior.begin_play(ctx));
        self.on_state_changed(
            kind,
            StateTransition::new(AbilityState::BeforeBeginPlay, AbilityState::JustEquipped),
        );
        Ok(())
    }

    /// Ends play of `kind` and drops it with its input binding.
    pub(super) fn uninstall_ability(&mut self, kind: &AbilityKind) -> bool {
        let Some(state) = self.state_of(kind) else {
            return false;
        };

        self.with_behavior(kind, |behavior, ctx| behavior.end_play(ctx));
        if self.role.authority && state.is_running() {
            self.cancel_ability(kind, false);
        }
        if let Some(last) = self
            .machine_mut(kind)
            .map(|machine| machine.force_state(AbilityState::AfterEndPlay))
        {
            self.on_state_changed(kind, StateTransition::new(last, AbilityState::AfterEndPlay));
        }

        self.ticking.remove(kind);
        self.pressed_inputs.retain(|_, bound| *bound != *kind);
        self.abilities.remove(kind);
        info!(target: "ability::state", peer = %self.peer, ability = %kind, "ability unequipped");
        self.events.push_back(SystemEvent::AbilityUnequipped(kind.clone()));
        true
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_equipped(&self, kind: &AbilityKind) -> bool {
        self.abilities.contains_key(kind)
    }

    pub fn equipped_abilities(&self) -> Vec<AbilityKind> {
        self.abilities.keys().cloned().collect()
    }

    /// Finds an equipped ability by its configured name or its kind.
    pub fn ability_by_name(&self, name: &str) -> Option<AbilityKind> {
        self.abilities
            .iter()
            .find(|(kind, slot)| slot.config.name == name || kind.as_str() == name)
            .map(|(kind, _)| kind.clone())
    }

    pub fn ability_state(&self, kind: &AbilityKind) -> Option<AbilityState> {
        self.state_of(kind)
    }

    pub fn ability_config(&self, kind: &AbilityKind) -> Option<Arc<AbilityConfig>> {
        self.config_of(kind)
    }

    pub fn ability_info(&self, kind: &AbilityKind) -> Option<AbilityInfo> {
        self.abilities.get(kind).map(|slot| AbilityInfo {
            kind: kind.clone(),
            state: slot.machine.state(),
            current_state_id: slot.machine.current_state_id(),
            last_requested_id: slot.machine.last_requested_id(),
            pressed: slot.machine.pressed().cloned(),
            ticking: self.ticking.contains(kind),
            cooling_down: self.cooldowns.is_cooling_down(kind),
        })
    }

    pub fn is_running(&self, kind: &AbilityKind) -> bool {
        self.state_of(kind).is_some_and(AbilityState::is_running)
    }

    pub fn is_casting(&self, kind: &AbilityKind) -> bool {
        self.state_of(kind) == Some(AbilityState::Cast)
    }

    pub fn is_activated(&self, kind: &AbilityKind) -> bool {
        self.state_of(kind) == Some(AbilityState::Activation)
    }

    pub fn is_cancelled(&self, kind: &AbilityKind) -> bool {
        self.state_of(kind) == Some(AbilityState::Cancelled)
    }

    pub fn has_succeeded(&self, kind: &AbilityKind) -> bool {
        self.state_of(kind) == Some(AbilityState::Succeeded)
    }

    pub fn has_finished(&self, kind: &AbilityKind) -> bool {
        self.state_of(kind).is_some_and(AbilityState::has_finished)
    }

    pub fn is_ticking(&self, kind: &AbilityKind) -> bool {
        self.ticking.contains(kind)
    }

    /// The behaviour's `can_cast` predicate alone, without tag or cooldown checks.
    pub fn can_cast(&self, kind: &AbilityKind, payload: &PayloadBag) -> bool {
        self.abilities.get(kind).is_some_and(|slot| {
            let behavior: &dyn AbilityBehavior =
                slot.behavior.as_deref().unwrap_or(&DefaultBehavior);
            behavior.can_cast(&self.view(kind, slot), payload)
        })
    }

    /// The behaviour's `can_activate` predicate alone, without tag or cooldown checks.
    pub fn can_activate(&self, kind: &AbilityKind, payload: &PayloadBag) -> bool {
        self.abilities.get(kind).is_some_and(|slot| {
            let behavior: &dyn AbilityBehavior =
                slot.behavior.as_deref().unwrap_or(&DefaultBehavior);
            behavior.can_activate(&self.view(kind, slot), payload)
        })
    }

    // ========================================================================
    // Cooldown queries and manual control
    // ========================================================================

    pub fn is_cooling_down(&self, kind: &AbilityKind) -> bool {
        self.cooldowns.is_cooling_down(kind)
    }

    pub fn remaining_cooldown(&self, kind: &AbilityKind) -> Duration {
        self.cooldowns.remaining(kind, self.now)
    }

    /// Configured cooldown length of an equipped ability.
    pub fn cooldown_duration(&self, kind: &AbilityKind) -> Duration {
        self.abilities
            .get(kind)
            .map(|slot| slot.config.cooldown_duration())
            .unwrap_or_default()
    }

    /// Starts the cooldown of `kind` and replicates it. Authority only.
    pub fn start_cooldown(&mut self, kind: &AbilityKind) -> bool {
        if !self.role.authority || self.cooldowns.is_cooling_down(kind) {
            return false;
        }
        if !self.config_of(kind).is_some_and(|config| config.has_cooldown()) {
            return false;
        }
        self.local_start_cooldown(kind);
        self.outbox.push(
            Route::AllPeers,
            NetMessage::CooldownStarted {
                ability: kind.clone(),
            },
        );
        true
    }

    /// Clears the cooldown of `kind` and replicates it. Authority only.
    pub fn reset_cooldown(&mut self, kind: &AbilityKind) -> bool {
        if !self.role.authority || !self.cooldowns.is_cooling_down(kind) {
            return false;
        }
        self.local_reset_cooldown(kind);
        self.outbox.push(
            Route::AllPeers,
            NetMessage::CooldownReset {
                ability: kind.clone(),
            },
        );
        true
    }

    // ========================================================================
    // Gameplay verbs
    // ========================================================================

    /// Starts the cast, or activates directly when the ability has no cast phase.
    pub fn start_cast(&mut self, kind: &AbilityKind, payload: PayloadBag) -> bool {
        let Some(config) = self.config_of(kind) else {
            debug!(target: "ability::state", ability = %kind, "cast of unequipped ability");
            return false;
        };
        let destination = if config.has_cast {
            AbilityState::Cast
        } else {
            AbilityState::Activation
        };
        self.set_state(kind, destination, payload, TransitionFlags::empty())
    }

    /// [`start_cast`](Self::start_cast) with an empty payload.
    pub fn cast_ability(&mut self, kind: &AbilityKind) -> bool {
        self.start_cast(kind, PayloadBag::new())
    }

    pub fn activate(&mut self, kind: &AbilityKind, payload: PayloadBag) -> bool {
        self.set_state(kind, AbilityState::Activation, payload, TransitionFlags::empty())
    }

    /// Finishes a cast into activation; a refused activation cancels the cast
    /// without cooldown.
    pub fn activate_or_cancel(&mut self, kind: &AbilityKind, payload: PayloadBag) -> bool {
        if !self.is_casting(kind) {
            return false;
        }
        if self.activate(kind, payload) {
            return true;
        }
        self.cancel_ability(kind, false);
        false
    }

    /// Cancels with cooldown, only if activated.
    pub fn deactivate(&mut self, kind: &AbilityKind) -> bool {
        self.is_activated(kind) && self.cancel_ability(kind, true)
    }

    pub fn cancel_ability(&mut self, kind: &AbilityKind, apply_cooldown: bool) -> bool {
        let flags = if apply_cooldown {
            TransitionFlags::START_COOLDOWN
        } else {
            TransitionFlags::empty()
        };
        self.set_state(kind, AbilityState::Cancelled, PayloadBag::new(), flags)
    }

    /// Cancels `kind` with cooldown. Requires authority or local control.
    pub fn cancel(&mut self, kind: &AbilityKind) -> bool {
        if !self.role.can_predict() {
            return false;
        }
        self.cancel_ability(kind, true)
    }

    /// Cancels every equipped ability with cooldown, returning how many moved.
    pub fn cancel_all(&mut self) -> usize {
        if !self.role.can_predict() {
            return 0;
        }
        self.equipped_abilities()
            .iter()
            .filter(|kind| self.cancel_ability(kind, true))
            .count()
    }
}
