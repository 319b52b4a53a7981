//! State change paths and their side effects.

use tracing::{debug, trace};

use super::{AbilitySlot, AbilitySystem};
use crate::ability::{
    AbilityBehavior, AbilityKind, AbilityState, CooldownMode, DefaultBehavior, StateTransition,
    TickPolicy, TransitionFlags,
};
use crate::cooldown::CooldownReadyReason;
use crate::error::{CoreError, GuardFailure, TransitionError};
use crate::events::SystemEvent;
use crate::input::InputProfile;
use crate::net::{NetMessage, Route};
use crate::payload::PayloadBag;
use crate::tags::TagDelta;

impl AbilitySystem {
    /// Local (predictive) state change, logging and swallowing the refusal reason.
    pub(crate) fn set_state(
        &mut self,
        kind: &AbilityKind,
        destination: AbilityState,
        payload: PayloadBag,
        flags: TransitionFlags,
    ) -> bool {
        match self.try_set_state(kind, destination, payload, flags) {
            Ok(()) => true,
            Err(err) => {
                debug!(
                    target: "ability::state",
                    ability = %kind,
                    %destination,
                    code = err.error_code(),
                    %err,
                    "state change refused"
                );
                false
            }
        }
    }

    /// Local (predictive) state change.
    ///
    /// On the authority a successful change bumps the state id and is
    /// broadcast; on the locally controlled client it is predicted and sent to
    /// the authority for confirmation. Either message is only sent if the
    /// side effects left the ability in `destination`.
    pub fn try_set_state(
        &mut self,
        kind: &AbilityKind,
        destination: AbilityState,
        mut payload: PayloadBag,
        flags: TransitionFlags,
    ) -> Result<(), TransitionError> {
        if !self.role.can_predict() {
            return Err(TransitionError::NotAuthorized);
        }
        let origin = self
            .state_of(kind)
            .ok_or_else(|| TransitionError::NotEquipped(kind.clone()))?;
        let transition = StateTransition::new(origin, destination).with_flags(flags);

        let previous = self.push_payload(kind, payload.clone());
        self.with_behavior(kind, |behavior, ctx| {
            behavior.pre_state_change(ctx, transition, &mut payload)
        });
        self.push_payload(kind, payload);

        let result = self.try_set_local(kind, transition);

        if result.is_ok() {
            if self.role.authority {
                if let Some(machine) = self.machine_mut(kind) {
                    machine.bump_state_id();
                }
                self.on_state_changed(kind, transition);
                self.broadcast_if_current(kind, transition);
            } else {
                self.on_state_changed(kind, transition);
                if self.state_of(kind) == Some(destination) {
                    let payload = self.active_payload(kind);
                    if let Some(machine) = self.machine_mut(kind) {
                        let request_id = machine.next_request_id();
                        self.outbox.push(
                            Route::Authority,
                            NetMessage::StateRequest {
                                ability: kind.clone(),
                                transition,
                                payload,
                                request_id,
                            },
                        );
                    }
                }
            }
        }

        self.pop_payload(kind, previous);
        result
    }

    /// Authority: announces `transition` if the ability is still in its destination.
    pub(super) fn broadcast_if_current(&mut self, kind: &AbilityKind, transition: StateTransition) {
        let Some(slot) = self.abilities.get(kind) else {
            return;
        };
        if slot.machine.state() != transition.destination {
            return;
        }
        let message = NetMessage::StateBroadcast {
            ability: kind.clone(),
            transition,
            payload: slot.machine.payload().clone(),
            state_id: slot.machine.current_state_id(),
        };
        self.outbox.push(Route::AllPeers, message);
    }

    /// Checks `transition` and, on success, moves the ability to its destination.
    pub(super) fn try_set_local(
        &mut self,
        kind: &AbilityKind,
        transition: StateTransition,
    ) -> Result<(), TransitionError> {
        let slot = self
            .abilities
            .get(kind)
            .ok_or_else(|| TransitionError::NotEquipped(kind.clone()))?;
        slot.machine.check_structure(kind, &transition)?;
        self.check_transition(kind, slot, &transition)?;

        if let Some(machine) = self.machine_mut(kind) {
            machine.force_state(transition.destination);
        }
        trace!(target: "ability::state", ability = %kind, %transition, "state changed");
        Ok(())
    }

    /// Guard: cooldown, tag requirements and the behaviour's predicates.
    fn check_transition(
        &self,
        kind: &AbilityKind,
        slot: &AbilitySlot,
        transition: &StateTransition,
    ) -> Result<(), TransitionError> {
        let reject = |reason| {
            Err(TransitionError::GuardRejected {
                ability: kind.clone(),
                origin: transition.origin,
                destination: transition.destination,
                reason,
            })
        };

        if transition.origin == AbilityState::Activation
            && transition.destination == AbilityState::Cast
        {
            return reject(GuardFailure::ActivationToCast);
        }
        if !matches!(
            transition.destination,
            AbilityState::Cast | AbilityState::Activation
        ) {
            return Ok(());
        }

        if self.cooldowns.is_cooling_down(kind) {
            return reject(GuardFailure::CoolingDown);
        }
        if !self.tags.contains_all(&slot.config.required_tags) {
            return reject(GuardFailure::MissingRequiredTags);
        }
        if self.tags.contains_any(&slot.config.blocked_tags) {
            return reject(GuardFailure::BlockedByTags);
        }

        let view = self.view(kind, slot);
        let payload = slot.machine.payload();
        let behavior: &dyn AbilityBehavior = slot.behavior.as_deref().unwrap_or(&DefaultBehavior);
        if transition.destination == AbilityState::Cast {
            if !behavior.can_cast(&view, payload) {
                return reject(GuardFailure::CanCast);
            }
        } else if !behavior.can_activate(&view, payload) {
            return reject(GuardFailure::CanActivate);
        }
        Ok(())
    }

    /// Side effects of a completed transition: exit effects of the origin,
    /// then enter effects of the destination if the exit effects did not move
    /// the ability elsewhere.
    pub(super) fn on_state_changed(&mut self, kind: &AbilityKind, transition: StateTransition) {
        let Some(config) = self.config_of(kind) else {
            return;
        };
        self.events.push_back(SystemEvent::StateChanged {
            ability: kind.clone(),
            transition,
        });

        match transition.origin {
            AbilityState::Cast => {
                self.apply_tag_delta(&config.cast_finish_tags);
                self.with_behavior(kind, |behavior, ctx| behavior.on_cast_finish(ctx));
                if config.tick == TickPolicy::WhileCasting {
                    self.ticking.remove(kind);
                }
            }
            AbilityState::Activation => {
                self.apply_tag_delta(&config.deactivation_tags);
                self.with_behavior(kind, |behavior, ctx| behavior.on_deactivate(ctx));
                if config.tick.includes_activation() {
                    self.ticking.remove(kind);
                }

                if transition.prediction_failed() {
                    self.local_reset_cooldown(kind);
                    if config.has_cast && config.resume_cast_on_failed_prediction {
                        self.start_cast(kind, PayloadBag::new());
                    }
                } else if transition.starts_cooldown()
                    && config.cooldown_mode() == Some(CooldownMode::OnDeactivation)
                {
                    self.local_start_cooldown(kind);
                }
            }
            AbilityState::BeforeBeginPlay => {
                if config.tick == TickPolicy::Always {
                    self.ticking.insert(kind.clone());
                }
            }
            _ => {}
        }

        if self.state_of(kind) != Some(transition.destination) {
            return;
        }

        match transition.destination {
            AbilityState::Cast => {
                self.apply_tag_delta(&config.cast_start_tags);
                let payload = self.active_payload(kind);
                self.with_behavior(kind, |behavior, ctx| behavior.on_cast(ctx, &payload));
                if config.tick.includes_cast() {
                    self.ticking.insert(kind.clone());
                }
            }
            AbilityState::Activation => {
                if config.cooldown_mode() == Some(CooldownMode::OnActivation) {
                    self.local_start_cooldown(kind);
                }
                self.apply_tag_delta(&config.activation_tags);
                let payload = self.active_payload(kind);
                self.with_behavior(kind, |behavior, ctx| behavior.on_activate(ctx, &payload));
                // Cast-and-activation ticking carries over from the cast.
                if config.tick == TickPolicy::WhileActivated
                    && self.state_of(kind) == Some(AbilityState::Activation)
                {
                    self.ticking.insert(kind.clone());
                }
            }
            AbilityState::AfterEndPlay => {
                if config.tick == TickPolicy::Always {
                    self.ticking.remove(kind);
                }
            }
            _ => {}
        }
    }

    pub(super) fn apply_tag_delta(&mut self, delta: &TagDelta) {
        if !delta.add.is_empty() {
            self.add_tags(&delta.add);
        }
        if !delta.remove.is_empty() {
            self.remove_tags(&delta.remove);
        }
    }

    // ========================================================================
    // Cooldowns
    // ========================================================================

    /// Starts the configured cooldown unless one is already running.
    pub(super) fn local_start_cooldown(&mut self, kind: &AbilityKind) {
        let Some(config) = self.config_of(kind) else {
            return;
        };
        if !config.has_cooldown() || self.cooldowns.is_cooling_down(kind) {
            return;
        }
        self.cooldowns.start(kind, config.cooldown_duration(), self.now);
        self.events.push_back(SystemEvent::CooldownStarted(kind.clone()));
        self.with_behavior(kind, |behavior, ctx| behavior.on_cooldown_started(ctx));
    }

    pub(super) fn local_reset_cooldown(&mut self, kind: &AbilityKind) {
        if self.cooldowns.reset(kind) {
            self.notify_cooldown_ready(kind, CooldownReadyReason::Reset);
        }
    }

    pub(super) fn notify_cooldown_ready(&mut self, kind: &AbilityKind, reason: CooldownReadyReason) {
        let Some(config) = self.config_of(kind) else {
            return;
        };
        self.events.push_back(SystemEvent::CooldownReady {
            ability: kind.clone(),
            reason,
        });
        self.with_behavior(kind, |behavior, ctx| behavior.on_cooldown_ready(ctx, reason));

        let held = self
            .abilities
            .get(kind)
            .is_some_and(|slot| slot.machine.pressed().is_some());
        if reason == CooldownReadyReason::Finished && held && config.input_waits_for_cooldown() {
            match config.input {
                InputProfile::CastWhileHolding => {
                    self.start_cast(kind, PayloadBag::new());
                }
                InputProfile::ActivateWhileHolding => {
                    self.activate(kind, PayloadBag::new());
                }
                _ => {}
            }
        }
    }
}
