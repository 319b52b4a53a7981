//! Per-ability state and sequence bookkeeping.
//!
//! The machine owns the structural half of the local transition check
//! (begun play, same state, forbidden destination). The guard half needs the
//! entity's tags, cooldowns and the behaviour, so the container evaluates it.

use std::collections::BTreeSet;

use super::{AbilityKind, AbilityState, StateTransition};
use crate::error::TransitionError;
use crate::input::InputSlot;
use crate::payload::PayloadBag;

#[derive(Clone, Debug)]
pub struct AbilityMachine {
    state: AbilityState,
    forbidden: BTreeSet<AbilityState>,
    /// Last id assigned by the authority.
    current_state_id: u32,
    /// Last id this peer generated for a request.
    last_requested_id: u32,
    pressed: Option<InputSlot>,
    /// Payload of the transition being processed.
    payload: PayloadBag,
}

impl AbilityMachine {
    pub fn new(has_cast: bool) -> Self {
        let mut forbidden = BTreeSet::from([AbilityState::BeforeBeginPlay, AbilityState::AfterEndPlay]);
        if !has_cast {
            forbidden.insert(AbilityState::Cast);
        }
        Self {
            state: AbilityState::BeforeBeginPlay,
            forbidden,
            current_state_id: 0,
            last_requested_id: 0,
            pressed: None,
            payload: PayloadBag::new(),
        }
    }

    pub fn state(&self) -> AbilityState {
        self.state
    }

    /// Moves to `state` without any checks. Callers own the side effects.
    pub(crate) fn force_state(&mut self, state: AbilityState) -> AbilityState {
        core::mem::replace(&mut self.state, state)
    }

    pub fn has_begun_play(&self) -> bool {
        self.state != AbilityState::BeforeBeginPlay
    }

    pub fn has_ended_play(&self) -> bool {
        self.state == AbilityState::AfterEndPlay
    }

    pub fn is_forbidden(&self, state: AbilityState) -> bool {
        self.forbidden.contains(&state)
    }

    pub fn forbidden_states(&self) -> impl Iterator<Item = AbilityState> + '_ {
        self.forbidden.iter().copied()
    }

    /// Structural part of the local transition check.
    pub fn check_structure(
        &self,
        kind: &AbilityKind,
        transition: &StateTransition,
    ) -> Result<(), TransitionError> {
        if !self.has_begun_play() || self.has_ended_play() {
            return Err(TransitionError::NotBegunPlay(kind.clone()));
        }
        if self.state == transition.destination || transition.origin == transition.destination {
            return Err(TransitionError::SameState {
                ability: kind.clone(),
                state: transition.destination,
            });
        }
        if self.is_forbidden(transition.destination) {
            return Err(TransitionError::Forbidden {
                ability: kind.clone(),
                state: transition.destination,
            });
        }
        Ok(())
    }

    pub fn current_state_id(&self) -> u32 {
        self.current_state_id
    }

    pub fn last_requested_id(&self) -> u32 {
        self.last_requested_id
    }

    /// Authority side: assigns the next id to a locally originated transition.
    pub(crate) fn bump_state_id(&mut self) -> u32 {
        self.current_state_id = self.current_state_id.wrapping_add(1);
        self.current_state_id
    }

    /// Adopts an id assigned (or accepted) by the authority.
    pub(crate) fn adopt_state_id(&mut self, id: u32) {
        self.current_state_id = id;
    }

    /// Requester side: `max(last_requested, current) + 1`.
    pub(crate) fn next_request_id(&mut self) -> u32 {
        self.last_requested_id = self.last_requested_id.max(self.current_state_id) + 1;
        self.last_requested_id
    }

    pub fn pressed(&self) -> Option<&InputSlot> {
        self.pressed.as_ref()
    }

    pub(crate) fn set_pressed(&mut self, slot: Option<InputSlot>) -> Option<InputSlot> {
        core::mem::replace(&mut self.pressed, slot)
    }

    pub fn payload(&self) -> &PayloadBag {
        &self.payload
    }

    /// Installs `payload` as the active payload and returns the previous one.
    pub(crate) fn swap_payload(&mut self, payload: PayloadBag) -> PayloadBag {
        core::mem::replace(&mut self.payload, payload)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    fn kind() -> AbilityKind {
        AbilityKind::new("dash")
    }

    fn equipped(has_cast: bool) -> AbilityMachine {
        let mut machine = AbilityMachine::new(has_cast);
        machine.force_state(AbilityState::JustEquipped);
        machine
    }

    #[test]
    fn nothing_moves_before_begin_play() {
        let machine = AbilityMachine::new(true);
        let transition = StateTransition::new(AbilityState::BeforeBeginPlay, AbilityState::Cast);
        assert_eq!(
            machine.check_structure(&kind(), &transition),
            Err(TransitionError::NotBegunPlay(kind()))
        );
    }

    #[test]
    fn lifecycle_states_are_never_reachable() {
        for has_cast in [true, false] {
            let machine = equipped(has_cast);
            for destination in AbilityState::iter() {
                let transition = StateTransition::new(machine.state(), destination);
                let allowed = machine.check_structure(&kind(), &transition).is_ok();
                if destination.is_lifecycle() || (!has_cast && destination == AbilityState::Cast) {
                    assert!(!allowed, "{destination} should be forbidden");
                }
            }
        }
    }

    #[test]
    fn same_state_is_refused() {
        let machine = equipped(true);
        let transition = StateTransition::new(AbilityState::Cancelled, AbilityState::JustEquipped);
        assert!(matches!(
            machine.check_structure(&kind(), &transition),
            Err(TransitionError::SameState { .. })
        ));
    }

    #[test]
    fn request_ids_stay_ahead_of_authority_ids() {
        let mut machine = equipped(true);
        assert_eq!(machine.next_request_id(), 1);
        assert_eq!(machine.next_request_id(), 2);

        machine.adopt_state_id(7);
        assert_eq!(machine.next_request_id(), 8);
        assert!(machine.last_requested_id() > machine.current_state_id());
    }
}
