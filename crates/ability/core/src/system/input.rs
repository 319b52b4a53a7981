//! Input slot routing.
//!
//! Each slot drives at most one ability and each ability listens to at most
//! one slot. Pressing a slot bound to another ability releases that ability
//! first; pressing an ability already held on another slot moves it there
//! without a second press.

use tracing::debug;

use super::AbilitySystem;
use crate::ability::AbilityKind;
use crate::input::{CancelInputResult, InputProfile, InputSlot};
use crate::payload::PayloadBag;

impl AbilitySystem {
    /// Presses `slot` for `kind`. Returns false if nothing changed.
    pub fn press_input(&mut self, kind: &AbilityKind, slot: &InputSlot) -> bool {
        if slot.as_str().is_empty() {
            return false;
        }
        if !self.abilities.contains_key(kind) {
            debug!(target: "ability::state", ability = %kind, %slot, "press for unequipped ability");
            return false;
        }

        match self.pressed_inputs.get(slot).cloned() {
            Some(bound) if bound == *kind => return false,
            Some(bound) => {
                self.release_input_by_ability(&bound);
            }
            None => {}
        }
        self.pressed_inputs.insert(slot.clone(), kind.clone());

        let previous = self
            .machine_mut(kind)
            .and_then(|machine| machine.set_pressed(Some(slot.clone())));
        match previous {
            Some(previous) => {
                self.pressed_inputs.remove(&previous);
            }
            None => self.on_input_pressed(kind),
        }
        true
    }

    /// Presses the configured default slot for `kind`.
    pub fn press_default_input(&mut self, kind: &AbilityKind) -> bool {
        let slot = self.config.default_input.clone();
        self.press_input(kind, &slot)
    }

    /// Releases `slot`, returning true if an ability was bound to it.
    pub fn release_input(&mut self, slot: &InputSlot) -> bool {
        let Some(kind) = self.pressed_inputs.remove(slot) else {
            return false;
        };
        self.release_ability_input(&kind);
        true
    }

    /// Releases whatever slot `kind` is held on.
    pub fn release_input_by_ability(&mut self, kind: &AbilityKind) -> bool {
        let Some(slot) = self
            .abilities
            .get(kind)
            .and_then(|ability| ability.machine.pressed().cloned())
        else {
            return false;
        };
        self.pressed_inputs.remove(&slot);
        self.release_ability_input(kind);
        true
    }

    /// Clears `slot` without the release action; the ability's
    /// `on_cancel_input` hook decides whether it cancels itself.
    pub fn cancel_input(&mut self, slot: &InputSlot) -> CancelInputResult {
        let Some(kind) = self.pressed_inputs.remove(slot) else {
            return CancelInputResult::default();
        };
        let was_pressed = self
            .machine_mut(&kind)
            .and_then(|machine| machine.set_pressed(None))
            .is_some();

        let ability_cancelled = was_pressed
            && self
                .with_behavior(&kind, |behavior, ctx| behavior.on_cancel_input(ctx))
                .unwrap_or(false);
        CancelInputResult {
            input_cancelled: true,
            ability_cancelled,
        }
    }

    pub fn is_input_pressed(&self, slot: &InputSlot) -> bool {
        self.pressed_inputs.contains_key(slot)
    }

    pub fn is_any_input_pressed(&self) -> bool {
        !self.pressed_inputs.is_empty()
    }

    pub fn pressed_ability(&self, slot: &InputSlot) -> Option<&AbilityKind> {
        self.pressed_inputs.get(slot)
    }

    fn release_ability_input(&mut self, kind: &AbilityKind) {
        let was_pressed = self
            .machine_mut(kind)
            .and_then(|machine| machine.set_pressed(None))
            .is_some();
        if was_pressed {
            self.on_input_released(kind);
        }
    }

    fn on_input_pressed(&mut self, kind: &AbilityKind) {
        let Some(config) = self.config_of(kind) else {
            return;
        };
        match config.input {
            InputProfile::CastWhileHolding => {
                self.start_cast(kind, PayloadBag::new());
            }
            InputProfile::ActivateOnPress | InputProfile::ActivateWhileHolding => {
                self.activate(kind, PayloadBag::new());
            }
            InputProfile::ToggleActivationOnPress => {
                if self.is_activated(kind) {
                    self.deactivate(kind);
                } else {
                    self.activate(kind, PayloadBag::new());
                }
            }
            InputProfile::None => {}
        }
        self.with_behavior(kind, |behavior, ctx| behavior.on_input_pressed(ctx));
    }

    fn on_input_released(&mut self, kind: &AbilityKind) {
        let Some(config) = self.config_of(kind) else {
            return;
        };
        match config.input {
            InputProfile::CastWhileHolding => {
                if config.has_cast && self.is_casting(kind) {
                    self.activate_or_cancel(kind, PayloadBag::new());
                }
            }
            InputProfile::ActivateWhileHolding => {
                self.deactivate(kind);
            }
            _ => {}
        }
        self.with_behavior(kind, |behavior, ctx| behavior.on_input_released(ctx));
    }
}
