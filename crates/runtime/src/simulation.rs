//! Multi-peer simulation of one replicated entity.
//!
//! Peer 0 is the authority. Peer 1 (if present) is the owning client and
//! predicts; every further peer is a simulated proxy that only mirrors.
//! Outboxes are flushed into the [`LoopbackNetwork`] and deliveries are
//! pumped until the network is idle.

use std::iter;
use std::sync::Arc;

use ability_core::{
    AbilityKind, AbilityRegistry, AbilityState, AbilitySystem, BuffCatalog, BuffCount,
    BuffCountWire, BuffReplication, Envelope, GameTime, NetRole, PeerId, Route, TagSet,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{Result, RuntimeError};
use crate::config::SimulationConfig;
use crate::events::{Event, EventBus};
use crate::network::LoopbackNetwork;

/// Observable state of one ability on one peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AbilitySnapshot {
    pub ability: AbilityKind,
    pub state: AbilityState,
    pub state_id: u32,
    pub cooling_down: bool,
}

/// Observable state of one peer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PeerSnapshot {
    pub peer: PeerId,
    pub authority: bool,
    pub tags: TagSet,
    pub abilities: Vec<AbilitySnapshot>,
    pub buffs: Vec<BuffCountWire>,
}

impl PeerSnapshot {
    pub fn capture(system: &AbilitySystem) -> Self {
        let abilities = system
            .equipped_abilities()
            .into_iter()
            .filter_map(|kind| system.ability_info(&kind))
            .map(|info| AbilitySnapshot {
                ability: info.kind,
                state: info.state,
                state_id: info.current_state_id,
                cooling_down: info.cooling_down,
            })
            .collect();
        Self {
            peer: system.peer(),
            authority: system.is_authority(),
            tags: system.tags().clone(),
            abilities,
            buffs: system.all_buffs().iter().map(BuffCount::to_wire).collect(),
        }
    }
}

pub struct Simulation {
    config: SimulationConfig,
    authority: AbilitySystem,
    /// Client `n` has peer id `n + 1`.
    clients: Vec<AbilitySystem>,
    network: LoopbackNetwork,
    bus: EventBus,
    ticks: u64,
    started: bool,
}

/// Builder for [`Simulation`].
pub struct SimulationBuilder {
    config: SimulationConfig,
    registry: Arc<AbilityRegistry>,
    catalog: Arc<BuffCatalog>,
    initial_abilities: Vec<AbilityKind>,
    initial_buffs: Vec<BuffCount>,
}

impl SimulationBuilder {
    fn new() -> Self {
        Self {
            config: SimulationConfig::default(),
            registry: Arc::new(AbilityRegistry::new()),
            catalog: Arc::new(BuffCatalog::new()),
            initial_abilities: Vec::new(),
            initial_buffs: Vec::new(),
        }
    }

    /// Override simulation configuration
    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Ability types shared by every peer
    pub fn registry(mut self, registry: AbilityRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Buff definitions shared by every peer
    pub fn catalog(mut self, catalog: BuffCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn initial_abilities(mut self, abilities: impl IntoIterator<Item = AbilityKind>) -> Self {
        self.initial_abilities = abilities.into_iter().collect();
        self
    }

    pub fn initial_buffs(mut self, buffs: impl IntoIterator<Item = BuffCount>) -> Self {
        self.initial_buffs = buffs.into_iter().collect();
        self
    }

    pub fn build(self) -> Result<Simulation> {
        self.config.validate()?;
        for kind in &self.initial_abilities {
            if !self.registry.contains(kind) {
                return Err(RuntimeError::UnknownAbility(kind.clone()));
            }
        }

        let mut authority = AbilitySystem::builder(Simulation::AUTHORITY, NetRole::AUTHORITY)
            .config(self.config.core.clone())
            .registry(Arc::clone(&self.registry))
            .catalog(Arc::clone(&self.catalog))
            .initial_abilities(self.initial_abilities)
            .initial_buffs(self.initial_buffs);
        if self.config.clients > 0 {
            authority = authority.owner(Simulation::OWNER);
        }

        let mut clients = Vec::with_capacity(self.config.clients as usize);
        for id in 1..=self.config.clients {
            let role = if PeerId(id) == Simulation::OWNER {
                NetRole::OWNING_CLIENT
            } else {
                NetRole::SIMULATED
            };
            clients.push(
                AbilitySystem::builder(PeerId(id), role)
                    .config(self.config.core.clone())
                    .registry(Arc::clone(&self.registry))
                    .catalog(Arc::clone(&self.catalog))
                    .build(),
            );
        }

        Ok(Simulation {
            network: LoopbackNetwork::new(self.config.faults.clone()),
            bus: EventBus::with_capacity(self.config.event_buffer_size),
            config: self.config,
            authority: authority.build(),
            clients,
            ticks: 0,
            started: false,
        })
    }
}

impl Simulation {
    pub const AUTHORITY: PeerId = PeerId(0);
    /// The client controlling the entity.
    pub const OWNER: PeerId = PeerId(1);

    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.systems().map(AbilitySystem::peer).collect()
    }

    pub fn peer(&self, id: PeerId) -> Result<&AbilitySystem> {
        match id {
            Self::AUTHORITY => Ok(&self.authority),
            PeerId(n) => self
                .clients
                .get(n as usize - 1)
                .ok_or(RuntimeError::UnknownPeer(id)),
        }
    }

    pub fn peer_mut(&mut self, id: PeerId) -> Result<&mut AbilitySystem> {
        match id {
            Self::AUTHORITY => Ok(&mut self.authority),
            PeerId(n) => self
                .clients
                .get_mut(n as usize - 1)
                .ok_or(RuntimeError::UnknownPeer(id)),
        }
    }

    pub fn authority(&self) -> &AbilitySystem {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut AbilitySystem {
        &mut self.authority
    }

    /// The authority followed by its clients, in peer id order.
    fn systems(&self) -> impl Iterator<Item = &AbilitySystem> {
        iter::once(&self.authority).chain(&self.clients)
    }

    fn systems_mut(&mut self) -> impl Iterator<Item = &mut AbilitySystem> {
        iter::once(&mut self.authority).chain(&mut self.clients)
    }

    pub fn network(&self) -> &LoopbackNetwork {
        &self.network
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn now(&self) -> GameTime {
        self.authority().now()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn snapshot(&self) -> Vec<PeerSnapshot> {
        self.systems().map(PeerSnapshot::capture).collect()
    }

    /// Peers whose abilities, tags or mirrored buffs differ from the authority.
    pub fn diverged_peers(&self) -> Vec<PeerId> {
        let reference = PeerSnapshot::capture(&self.authority);
        self.clients
            .iter()
            .filter(|peer| {
                let snapshot = PeerSnapshot::capture(peer);
                let abilities = snapshot
                    .abilities
                    .iter()
                    .map(|a| (&a.ability, a.state))
                    .ne(reference.abilities.iter().map(|a| (&a.ability, a.state)));
                let buffs = self.mirrors_buffs(peer.peer()) && snapshot.buffs != reference.buffs;
                abilities || buffs || snapshot.tags != reference.tags
            })
            .map(AbilitySystem::peer)
            .collect()
    }

    fn mirrors_buffs(&self, peer: PeerId) -> bool {
        match self.config.core.buff_replication {
            BuffReplication::None => false,
            BuffReplication::OwningClient => peer == Self::OWNER,
            BuffReplication::AllPeers => true,
        }
    }

    // ========================================================================
    // Driving
    // ========================================================================

    /// Initializes every peer and replicates the authority's initial state.
    pub fn start(&mut self) -> Result<usize> {
        if self.started {
            return Ok(0);
        }
        self.started = true;
        info!(
            target: "ability::net",
            peers = self.clients.len() + 1,
            "simulation started"
        );
        for peer in self.systems_mut() {
            peer.initialize();
        }
        self.pump()
    }

    /// Advances every peer by one tick interval, then pumps traffic.
    pub fn step(&mut self) -> Result<usize> {
        let dt = self.config.tick_interval;
        for peer in self.systems_mut() {
            peer.tick(dt);
        }
        self.ticks += 1;
        self.pump()
    }

    pub fn run(&mut self, steps: u64) -> Result<usize> {
        let mut delivered = 0;
        for _ in 0..steps {
            delivered += self.step()?;
        }
        Ok(delivered)
    }

    /// Runs `action` against one peer, then pumps the traffic it produced.
    pub fn with_peer<R>(
        &mut self,
        id: PeerId,
        action: impl FnOnce(&mut AbilitySystem) -> R,
    ) -> Result<R> {
        let result = action(self.peer_mut(id)?);
        self.pump()?;
        Ok(result)
    }

    /// Delivers traffic until the network is idle, returning the number of
    /// messages delivered.
    pub fn pump(&mut self) -> Result<usize> {
        let mut delivered = 0;
        for _ in 0..self.config.max_pump_rounds {
            self.flush_outboxes()?;
            self.publish_events();
            if self.network.is_idle() {
                return Ok(delivered);
            }
            for delivery in self.network.drain() {
                let peer = self.peer_mut(delivery.to)?;
                peer.receive(delivery.from, delivery.message);
                delivered += 1;
            }
        }
        warn!(
            target: "ability::net",
            in_flight = self.network.in_flight(),
            "pump round limit reached"
        );
        Ok(delivered)
    }

    /// Tears every peer down, authority first, and replicates the result.
    pub fn shutdown(&mut self) -> Result<usize> {
        if !self.started {
            return Ok(0);
        }
        self.authority.teardown();
        let delivered = self.pump()?;
        for peer in &mut self.clients {
            peer.teardown();
        }
        self.publish_events();
        self.started = false;
        Ok(delivered)
    }

    fn flush_outboxes(&mut self) -> Result<()> {
        let ids = self.peer_ids();
        let outgoing: Vec<(PeerId, Vec<Envelope>)> = self
            .systems_mut()
            .map(|peer| (peer.peer(), peer.drain_outbox()))
            .collect();
        for (from, envelopes) in outgoing {
            for envelope in envelopes {
                let targets: Vec<PeerId> = match envelope.route {
                    Route::Authority => vec![Self::AUTHORITY],
                    Route::Peer(peer) => vec![peer],
                    Route::AllPeers => ids.iter().copied().filter(|id| *id != from).collect(),
                };
                for to in targets {
                    if to == from {
                        continue;
                    }
                    if !ids.contains(&to) {
                        return Err(RuntimeError::UnknownPeer(to));
                    }
                    debug!(
                        target: "ability::net",
                        %from,
                        %to,
                        message = envelope.message.name(),
                        "send"
                    );
                    self.network.send(from, to, envelope.message.clone())?;
                }
            }
        }
        Ok(())
    }

    fn publish_events(&mut self) {
        let bus = &self.bus;
        for peer in iter::once(&mut self.authority).chain(&mut self.clients) {
            let id = peer.peer();
            for event in peer.drain_events() {
                bus.publish(Event::new(id, event));
            }
        }
    }
}
