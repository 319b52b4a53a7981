//! Inbound replication traffic.
//!
//! Staleness is decided by state ids alone: the authority discards requests
//! whose id it has already passed and a requester discards rejections older
//! than the state it last adopted.

use tracing::{debug, trace};

use super::AbilitySystem;
use crate::ability::{AbilityKind, AbilityState, StateTransition, TransitionFlags};
use crate::error::{CoreError, ProtocolError};
use crate::net::{NetMessage, PeerId, Route};
use crate::payload::PayloadBag;

impl AbilitySystem {
    /// Handles one message from `from`. Invalid messages are logged and dropped.
    pub fn receive(&mut self, from: PeerId, message: NetMessage) {
        let name = message.name();
        if let Err(err) = self.try_receive(from, message) {
            debug!(
                target: "ability::net",
                peer = %self.peer,
                %from,
                message = name,
                code = err.error_code(),
                %err,
                "message dropped"
            );
        }
    }

    pub fn try_receive(&mut self, from: PeerId, message: NetMessage) -> Result<(), ProtocolError> {
        trace!(target: "ability::net", peer = %self.peer, %from, message = message.name(), "received");
        match message {
            NetMessage::StateRequest {
                ability,
                transition,
                payload,
                request_id,
            } => self.handle_request(from, ability, transition, payload, request_id),
            NetMessage::StateRejected {
                ability,
                transition,
                request_id,
            } => self.handle_rejection(ability, transition, request_id),
            NetMessage::StateBroadcast {
                ability,
                transition,
                payload,
                state_id,
            } => self.handle_broadcast(ability, transition, payload, state_id),
            NetMessage::CooldownStarted { ability } => {
                if !self.role.authority {
                    self.known_ability(&ability)?;
                    self.local_start_cooldown(&ability);
                }
                Ok(())
            }
            NetMessage::CooldownReset { ability } => {
                if !self.role.authority {
                    self.known_ability(&ability)?;
                    self.local_reset_cooldown(&ability);
                }
                Ok(())
            }
            NetMessage::BuffsChanged { operation, buffs } => {
                if !self.role.authority {
                    let resolved = self.catalog.resolve(&buffs)?;
                    self.mirror_buffs(operation, resolved);
                }
                Ok(())
            }
            NetMessage::AbilityEquipped { ability } => {
                if !self.role.authority && !self.abilities.contains_key(&ability) {
                    self.install_ability(&ability)?;
                }
                Ok(())
            }
            NetMessage::AbilityUnequipped { ability } => {
                if !self.role.authority {
                    self.known_ability(&ability)?;
                    self.uninstall_ability(&ability);
                }
                Ok(())
            }
            NetMessage::TagsSnapshot { tags } => {
                if !self.role.authority {
                    self.replace_tags(tags);
                }
                Ok(())
            }
        }
    }

    /// Authority: validates a predicted transition from a client.
    fn handle_request(
        &mut self,
        from: PeerId,
        kind: AbilityKind,
        requested: StateTransition,
        payload: PayloadBag,
        request_id: u32,
    ) -> Result<(), ProtocolError> {
        if !self.role.authority {
            return Ok(());
        }
        if request_id == 0 {
            return Err(ProtocolError::InvalidRequestId);
        }
        let (state, current_id) = self.known_ability(&kind)?;
        if request_id <= current_id {
            debug!(
                target: "ability::net",
                ability = %kind,
                request_id,
                current_id,
                "stale request discarded"
            );
            return Ok(());
        }

        let transition =
            StateTransition::new(state, requested.destination).with_flags(requested.flags);
        let previous = self.push_payload(&kind, payload);
        match self.try_set_local(&kind, transition) {
            Ok(()) => {
                if let Some(machine) = self.machine_mut(&kind) {
                    machine.adopt_state_id(request_id);
                }
                self.on_state_changed(&kind, transition);
                self.broadcast_if_current(&kind, transition);
            }
            Err(err) => {
                debug!(
                    target: "ability::net",
                    ability = %kind,
                    request_id,
                    code = err.error_code(),
                    %err,
                    "request rejected"
                );
                let rejection = StateTransition::new(requested.destination, state)
                    .with_flags(requested.flags | TransitionFlags::PREDICTION_FAILED);
                self.outbox.push(
                    Route::Peer(from),
                    NetMessage::StateRejected {
                        ability: kind.clone(),
                        transition: rejection,
                        request_id,
                    },
                );
            }
        }
        self.pop_payload(&kind, previous);
        Ok(())
    }

    /// Requester: rolls a refused prediction back to the authority's state.
    fn handle_rejection(
        &mut self,
        kind: AbilityKind,
        rejection: StateTransition,
        request_id: u32,
    ) -> Result<(), ProtocolError> {
        if self.role.authority {
            return Ok(());
        }
        let (state, current_id) = self.known_ability(&kind)?;
        if current_id > request_id {
            debug!(
                target: "ability::net",
                ability = %kind,
                request_id,
                current_id,
                "stale rejection discarded"
            );
            return Ok(());
        }
        if state == rejection.destination {
            return Ok(());
        }

        debug!(target: "ability::net", ability = %kind, %rejection, "prediction failed");
        if let Some(machine) = self.machine_mut(&kind) {
            machine.force_state(rejection.destination);
        }
        let transition = StateTransition::new(state, rejection.destination)
            .with_flags(rejection.flags | TransitionFlags::PREDICTION_FAILED);
        let previous = self.push_payload(&kind, PayloadBag::new());
        self.on_state_changed(&kind, transition);
        self.pop_payload(&kind, previous);
        Ok(())
    }

    /// Mirror: adopts the authority's id and state.
    fn handle_broadcast(
        &mut self,
        kind: AbilityKind,
        broadcast: StateTransition,
        payload: PayloadBag,
        state_id: u32,
    ) -> Result<(), ProtocolError> {
        if self.role.authority {
            return Ok(());
        }
        let (state, _) = self.known_ability(&kind)?;
        if let Some(machine) = self.machine_mut(&kind) {
            machine.adopt_state_id(state_id);
        }
        if state == broadcast.destination {
            return Ok(());
        }

        if let Some(machine) = self.machine_mut(&kind) {
            machine.force_state(broadcast.destination);
        }
        let transition =
            StateTransition::new(state, broadcast.destination).with_flags(broadcast.flags);
        let previous = self.push_payload(&kind, payload);
        self.on_state_changed(&kind, transition);
        self.pop_payload(&kind, previous);
        Ok(())
    }

    /// State and state id of an equipped ability.
    fn known_ability(&self, kind: &AbilityKind) -> Result<(AbilityState, u32), ProtocolError> {
        self.abilities
            .get(kind)
            .map(|slot| (slot.machine.state(), slot.machine.current_state_id()))
            .ok_or_else(|| ProtocolError::UnknownAbility(kind.clone()))
    }
}
