//! Topic-based event bus implementation.

use std::collections::HashMap;
use std::sync::Arc;

use ability_core::{PeerId, SystemEvent, TagSet};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Equips, state changes and cooldowns
    Abilities,
    /// Buff applications and removals
    Buffs,
    /// Tag set changes
    Tags,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::Abilities, Topic::Buffs, Topic::Tags];
}

/// Container event stamped with the peer that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub peer: PeerId,
    pub event: SystemEvent,
}

impl Event {
    pub fn new(peer: PeerId, event: SystemEvent) -> Self {
        Self { peer, event }
    }

    pub fn topic(&self) -> Topic {
        match &self.event {
            SystemEvent::AbilityEquipped(_)
            | SystemEvent::AbilityUnequipped(_)
            | SystemEvent::StateChanged { .. }
            | SystemEvent::CooldownStarted(_)
            | SystemEvent::CooldownReady { .. } => Topic::Abilities,
            SystemEvent::BuffsApplied(_) | SystemEvent::BuffsRemoved(_) => Topic::Buffs,
            SystemEvent::TagsChanged(_) => Topic::Tags,
        }
    }

    /// Tag set carried by a [`Topic::Tags`] event.
    pub fn tags(&self) -> Option<&TagSet> {
        match &self.event {
            SystemEvent::TagsChanged(tags) => Some(tags),
            _ => None,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Every topic channel exists from construction on.
pub struct EventBus {
    channels: Arc<HashMap<Topic, broadcast::Sender<Event>>>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity.max(1)).0))
            .collect();

        Self {
            channels: Arc::new(channels),
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if let Some(tx) = self.channels.get(&topic)
            && tx.send(event).is_err()
        {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> Option<broadcast::Receiver<Event>> {
        self.channels.get(&topic).map(broadcast::Sender::subscribe)
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .filter_map(|&topic| self.subscribe(topic).map(|rx| (topic, rx)))
            .collect()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.channels
            .get(&topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
