//! In-process loopback transport with seeded fault injection.
//!
//! Each ordered `(from, to)` pair owns a FIFO queue. With a reorder window a
//! newly queued message may be inserted ahead of some already queued ones;
//! with a drop probability it may be lost. Both draw from one seeded
//! [`StdRng`] so runs are reproducible.

use std::collections::{BTreeMap, VecDeque};

use ability_core::{NetMessage, PeerId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::trace;

use crate::api::Result;
use crate::config::FaultConfig;

/// A message handed to its recipient.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub from: PeerId,
    pub to: PeerId,
    pub message: NetMessage,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub sent: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub reordered: u64,
    pub bytes: u64,
}

#[derive(Debug)]
pub struct LoopbackNetwork {
    faults: FaultConfig,
    rng: StdRng,
    links: BTreeMap<(PeerId, PeerId), VecDeque<NetMessage>>,
    stats: NetworkStats,
}

impl LoopbackNetwork {
    pub fn new(faults: FaultConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(faults.seed),
            faults,
            links: BTreeMap::new(),
            stats: NetworkStats::default(),
        }
    }

    pub fn reliable() -> Self {
        Self::new(FaultConfig::reliable())
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    pub fn faults(&self) -> &FaultConfig {
        &self.faults
    }

    /// Messages queued and not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.links.values().map(VecDeque::len).sum()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Queues `message` on the `from -> to` link.
    pub fn send(&mut self, from: PeerId, to: PeerId, message: NetMessage) -> Result<()> {
        self.stats.sent += 1;
        let message = if self.faults.encode_messages {
            let bytes = message.to_bytes()?;
            self.stats.bytes += bytes.len() as u64;
            NetMessage::from_bytes(&bytes)?
        } else {
            message
        };

        if self.faults.drop_probability > 0.0 && self.rng.gen_bool(self.faults.drop_probability) {
            self.stats.dropped += 1;
            trace!(target: "ability::net", %from, %to, message = message.name(), "dropped");
            return Ok(());
        }

        let queue = self.links.entry((from, to)).or_default();
        let window = self.faults.reorder_window.min(queue.len());
        if window > 0 {
            let skip = self.rng.gen_range(0..=window);
            if skip > 0 {
                self.stats.reordered += 1;
            }
            queue.insert(queue.len() - skip, message);
        } else {
            queue.push_back(message);
        }
        Ok(())
    }

    /// Takes every queued message, link by link, oldest first within a link.
    pub fn drain(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(self.in_flight());
        for (&(from, to), queue) in &mut self.links {
            deliveries.extend(queue.drain(..).map(|message| Delivery { from, to, message }));
        }
        self.links.retain(|_, queue| !queue.is_empty());
        self.stats.delivered += deliveries.len() as u64;
        deliveries
    }

    /// Takes the messages queued for `to`.
    pub fn poll(&mut self, to: PeerId) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for (&(from, link_to), queue) in &mut self.links {
            if link_to == to {
                deliveries.extend(queue.drain(..).map(|message| Delivery { from, to, message }));
            }
        }
        self.links.retain(|_, queue| !queue.is_empty());
        self.stats.delivered += deliveries.len() as u64;
        deliveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ability_core::AbilityKind;

    fn reset(n: u32) -> NetMessage {
        NetMessage::CooldownReset {
            ability: AbilityKind::owned(format!("a{n}")),
        }
    }

    #[test]
    fn reliable_links_preserve_order() {
        let mut network = LoopbackNetwork::reliable();
        for n in 0..5 {
            network.send(PeerId(0), PeerId(1), reset(n)).unwrap();
        }
        network.send(PeerId(1), PeerId(0), reset(9)).unwrap();

        let to_client = network.poll(PeerId(1));
        assert_eq!(
            to_client.into_iter().map(|d| d.message).collect::<Vec<_>>(),
            (0..5).map(reset).collect::<Vec<_>>()
        );
        assert_eq!(network.in_flight(), 1);
        assert!(network.stats().bytes > 0);
    }

    #[test]
    fn same_seed_reorders_identically() {
        let faults = FaultConfig {
            reorder_window: 3,
            ..FaultConfig::reliable()
        };
        let run = || {
            let mut network = LoopbackNetwork::new(faults.clone());
            for n in 0..20 {
                network.send(PeerId(0), PeerId(1), reset(n)).unwrap();
            }
            network.drain()
        };
        let first = run();
        assert_eq!(first, run());
        assert_eq!(first.len(), 20);
    }

    #[test]
    fn certain_drop_loses_everything() {
        let mut network = LoopbackNetwork::new(FaultConfig {
            drop_probability: 1.0,
            ..FaultConfig::reliable()
        });
        network.send(PeerId(0), PeerId(1), reset(0)).unwrap();
        assert!(network.is_idle());
        assert_eq!(network.stats().dropped, 1);
    }
}
