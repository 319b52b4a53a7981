//! Replication messages and routing.
//!
//! The container never performs I/O. It queues [`Envelope`]s in its
//! [`Outbox`] and the host delivers them; inbound messages are handed to
//! `AbilitySystem::receive`. Channels are assumed reliable and ordered per
//! peer pair.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ability::{AbilityKind, StateTransition};
use crate::buff::{BuffCountWire, BuffOperation};
use crate::error::ProtocolError;
use crate::payload::PayloadBag;
use crate::tags::TagSet;

/// Transport-level peer identifier.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PeerId(pub u32);

impl core::fmt::Display for PeerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Network role of a peer with respect to one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetRole {
    pub authority: bool,
    pub locally_controlled: bool,
}

impl NetRole {
    /// Single-player or listen-server host controlling its own entity.
    pub const STANDALONE: Self = Self::new(true, true);
    /// Server simulating an entity controlled by a remote client.
    pub const AUTHORITY: Self = Self::new(true, false);
    /// Remote client controlling the entity.
    pub const OWNING_CLIENT: Self = Self::new(false, true);
    /// Remote client observing the entity.
    pub const SIMULATED: Self = Self::new(false, false);

    pub const fn new(authority: bool, locally_controlled: bool) -> Self {
        Self {
            authority,
            locally_controlled,
        }
    }

    /// May originate state changes.
    pub const fn can_predict(&self) -> bool {
        self.authority || self.locally_controlled
    }
}

/// Where an envelope goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    /// Request to the authority.
    Authority,
    /// Reply to one peer.
    Peer(PeerId),
    /// Broadcast to every other peer.
    AllPeers,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum NetMessage {
    /// Client asks the authority to confirm a predicted transition.
    StateRequest {
        ability: AbilityKind,
        transition: StateTransition,
        payload: PayloadBag,
        request_id: u32,
    },
    /// Authority refuses a request and states its own view.
    StateRejected {
        ability: AbilityKind,
        transition: StateTransition,
        request_id: u32,
    },
    /// Authority announces a transition.
    StateBroadcast {
        ability: AbilityKind,
        transition: StateTransition,
        payload: PayloadBag,
        state_id: u32,
    },
    CooldownStarted {
        ability: AbilityKind,
    },
    CooldownReset {
        ability: AbilityKind,
    },
    BuffsChanged {
        operation: BuffOperation,
        buffs: Vec<BuffCountWire>,
    },
    AbilityEquipped {
        ability: AbilityKind,
    },
    AbilityUnequipped {
        ability: AbilityKind,
    },
    /// Full tag set of the authority.
    TagsSnapshot {
        tags: TagSet,
    },
}

impl NetMessage {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(self).map_err(|err| ProtocolError::Codec(err.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        bincode::deserialize(bytes).map_err(|err| ProtocolError::Codec(err.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub route: Route,
    pub message: NetMessage,
}

/// Outbound queue of a container.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Envelope>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, route: Route, message: NetMessage) {
        self.queue.push_back(Envelope { route, message });
    }

    /// Queues a tag snapshot, replacing the previous one if it is still the last entry.
    pub fn push_tags(&mut self, tags: TagSet) {
        if let Some(Envelope {
            message: NetMessage::TagsSnapshot { tags: pending },
            ..
        }) = self.queue.back_mut()
        {
            *pending = tags;
            return;
        }
        self.push(Route::AllPeers, NetMessage::TagsSnapshot { tags });
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> + '_ {
        self.queue.iter()
    }

    pub fn drain(&mut self) -> Vec<Envelope> {
        self.queue.drain(..).collect()
    }
}
