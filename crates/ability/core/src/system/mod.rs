//! The per-entity ability and buff container.
//!
//! [`AbilitySystem`] owns the equipped abilities, the input routing table,
//! the entity tag set, the buff ledger and both timer tables. It is the only
//! entry point for gameplay code and for inbound replication traffic.
//!
//! The implementation is split by concern:
//! - [`abilities`] equip/unequip, queries and the gameplay verbs
//! - [`transition`] the local/authoritative state change paths and side effects
//! - [`protocol`] inbound message handling
//! - [`input`] input slot routing
//! - [`tags`] tag mutation and interruption
//! - [`buffs`] the buff API on top of the ledger

mod abilities;
mod buffs;
mod input;
mod protocol;
mod tags;
mod transition;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use crate::ability::{
    AbilityBehavior, AbilityCommand, AbilityConfig, AbilityContext, AbilityKind, AbilityMachine,
    AbilityRegistry, AbilityState, AbilityView,
};
use crate::buff::{BuffCatalog, BuffCount, BuffLedger, LifetimeTable};
use crate::config::CoreConfig;
use crate::cooldown::{CooldownReadyReason, CooldownTable};
use crate::events::SystemEvent;
use crate::input::InputSlot;
use crate::net::{Envelope, NetRole, Outbox, PeerId};
use crate::payload::PayloadBag;
use crate::tags::TagSet;
use crate::time::GameTime;

/// An equipped ability: static config, protocol state and behaviour.
pub(crate) struct AbilitySlot {
    config: Arc<AbilityConfig>,
    machine: AbilityMachine,
    /// Taken out while one of its hooks runs.
    behavior: Option<Box<dyn AbilityBehavior>>,
}

/// Snapshot of an equipped ability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AbilityInfo {
    pub kind: AbilityKind,
    pub state: AbilityState,
    pub current_state_id: u32,
    pub last_requested_id: u32,
    pub pressed: Option<InputSlot>,
    pub ticking: bool,
    pub cooling_down: bool,
}

pub struct AbilitySystem {
    peer: PeerId,
    role: NetRole,
    /// Peer controlling the entity, used for owning-client buff replication.
    owner: Option<PeerId>,
    config: CoreConfig,
    registry: Arc<AbilityRegistry>,
    catalog: Arc<BuffCatalog>,

    now: GameTime,
    tags: TagSet,
    abilities: BTreeMap<AbilityKind, AbilitySlot>,
    ticking: BTreeSet<AbilityKind>,
    pressed_inputs: BTreeMap<InputSlot, AbilityKind>,
    cooldowns: CooldownTable,
    ledger: BuffLedger,
    lifetimes: LifetimeTable,

    initial_abilities: Vec<AbilityKind>,
    initial_buffs: Vec<BuffCount>,
    active: bool,
    tearing_down: bool,
    hook_depth: usize,

    outbox: Outbox,
    events: VecDeque<SystemEvent>,
}

/// Builder for [`AbilitySystem`].
pub struct AbilitySystemBuilder {
    peer: PeerId,
    role: NetRole,
    owner: Option<PeerId>,
    config: CoreConfig,
    registry: Arc<AbilityRegistry>,
    catalog: Arc<BuffCatalog>,
    initial_abilities: Vec<AbilityKind>,
    initial_buffs: Vec<BuffCount>,
}

impl AbilitySystemBuilder {
    pub fn owner(mut self, owner: PeerId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Arc<AbilityRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn catalog(mut self, catalog: Arc<BuffCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Abilities equipped by `AbilitySystem::initialize` on the authority.
    pub fn initial_abilities(mut self, abilities: impl IntoIterator<Item = AbilityKind>) -> Self {
        self.initial_abilities = abilities.into_iter().collect();
        self
    }

    /// Buffs applied by `AbilitySystem::initialize` on the authority.
    pub fn initial_buffs(mut self, buffs: impl IntoIterator<Item = BuffCount>) -> Self {
        self.initial_buffs = buffs.into_iter().collect();
        self
    }

    pub fn build(self) -> AbilitySystem {
        AbilitySystem {
            peer: self.peer,
            role: self.role,
            owner: self.owner,
            config: self.config,
            registry: self.registry,
            catalog: self.catalog,
            now: GameTime::ZERO,
            tags: TagSet::new(),
            abilities: BTreeMap::new(),
            ticking: BTreeSet::new(),
            pressed_inputs: BTreeMap::new(),
            cooldowns: CooldownTable::new(),
            ledger: BuffLedger::new(),
            lifetimes: LifetimeTable::new(),
            initial_abilities: self.initial_abilities,
            initial_buffs: self.initial_buffs,
            active: false,
            tearing_down: false,
            hook_depth: 0,
            outbox: Outbox::new(),
            events: VecDeque::new(),
        }
    }
}

impl AbilitySystem {
    pub fn builder(peer: PeerId, role: NetRole) -> AbilitySystemBuilder {
        AbilitySystemBuilder {
            peer,
            role,
            owner: None,
            config: CoreConfig::default(),
            registry: Arc::new(AbilityRegistry::new()),
            catalog: Arc::new(BuffCatalog::new()),
            initial_abilities: Vec::new(),
            initial_buffs: Vec::new(),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role.authority
    }

    pub fn is_locally_controlled(&self) -> bool {
        self.role.locally_controlled
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<AbilityRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<BuffCatalog> {
        &self.catalog
    }

    pub fn now(&self) -> GameTime {
        self.now
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_tearing_down(&self) -> bool {
        self.tearing_down
    }

    /// Takes every envelope queued since the last call.
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        self.outbox.drain()
    }

    pub fn pending_outbox(&self) -> impl Iterator<Item = &Envelope> + '_ {
        self.outbox.iter()
    }

    /// Takes every observer event emitted since the last call.
    pub fn drain_events(&mut self) -> Vec<SystemEvent> {
        self.events.drain(..).collect()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Starts the container. The authority applies initial buffs and equips
    /// initial abilities.
    pub fn initialize(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        if self.role.authority {
            let buffs = self.initial_buffs.clone();
            self.apply_buffs(buffs);
            let abilities = self.initial_abilities.clone();
            self.equip_abilities(abilities);
        }
    }

    /// Tears the container down: unequips everything, resets buffs and drops
    /// all cooldowns.
    pub fn teardown(&mut self) {
        if !self.active {
            return;
        }
        self.tearing_down = true;
        if self.role.authority {
            self.unequip_all();
            self.reset_buffs();
        }
        self.cooldowns.reset_all();
        self.tearing_down = false;
        self.active = false;
    }

    /// Advances the clock by `dt`, then sweeps buff lifetimes, delivers
    /// cooldown completions and ticks abilities, in that order.
    pub fn tick(&mut self, dt: Duration) {
        self.now = self.now + dt;

        self.expire_buffs();

        for ability in self.cooldowns.expire(self.now) {
            if self.abilities.contains_key(&ability) {
                self.notify_cooldown_ready(&ability, CooldownReadyReason::Finished);
            }
        }

        let ticking: Vec<AbilityKind> = self.ticking.iter().cloned().collect();
        for kind in ticking {
            if self.ticking.contains(&kind) {
                self.with_behavior(&kind, |behavior, ctx| behavior.tick(ctx, dt));
            }
        }
    }

    // ========================================================================
    // Hook plumbing
    // ========================================================================

    fn view<'a>(&'a self, kind: &'a AbilityKind, slot: &'a AbilitySlot) -> AbilityView<'a> {
        AbilityView {
            kind,
            config: &slot.config,
            state: slot.machine.state(),
            tags: &self.tags,
            role: self.role,
            now: self.now,
            cooling_down: self.cooldowns.is_cooling_down(kind),
            pressed: slot.machine.pressed(),
            payload: slot.machine.payload(),
        }
    }

    /// Runs one hook of `kind`'s behaviour, then executes the commands it queued.
    ///
    /// Returns `None` if the ability is not equipped.
    fn with_behavior<R>(
        &mut self,
        kind: &AbilityKind,
        hook: impl FnOnce(&mut dyn AbilityBehavior, &mut AbilityContext<'_>) -> R,
    ) -> Option<R> {
        let slot = self.abilities.get_mut(kind)?;
        let Some(mut behavior) = slot.behavior.take() else {
            warn!(target: "ability::state", ability = %kind, "behavior re-entered, hook skipped");
            return None;
        };

        let outcome = self.abilities.get(kind).map(|slot| {
            let mut ctx = AbilityContext::new(self.view(kind, slot));
            let result = hook(behavior.as_mut(), &mut ctx);
            (result, ctx.into_commands())
        });
        if let Some(slot) = self.abilities.get_mut(kind) {
            slot.behavior = Some(behavior);
        }

        let (result, commands) = outcome?;
        self.run_commands(kind, commands);
        Some(result)
    }

    fn run_commands(&mut self, kind: &AbilityKind, commands: Vec<AbilityCommand>) {
        if commands.is_empty() {
            return;
        }
        if self.hook_depth >= self.config.max_hook_depth {
            error!(
                target: "ability::state",
                ability = %kind,
                dropped = commands.len(),
                "hook chain too deep, dropping commands"
            );
            return;
        }

        self.hook_depth += 1;
        for command in commands {
            match command {
                AbilityCommand::StartCast(payload) => {
                    self.start_cast(kind, payload);
                }
                AbilityCommand::Activate(payload) => {
                    self.activate(kind, payload);
                }
                AbilityCommand::ActivateOrCancel(payload) => {
                    self.activate_or_cancel(kind, payload);
                }
                AbilityCommand::Deactivate => {
                    self.deactivate(kind);
                }
                AbilityCommand::Cancel { apply_cooldown } => {
                    self.cancel_ability(kind, apply_cooldown);
                }
                AbilityCommand::StartCooldown => {
                    self.start_cooldown(kind);
                }
                AbilityCommand::ResetCooldown => {
                    self.reset_cooldown(kind);
                }
                AbilityCommand::AddTags(tags) => {
                    self.add_tags(&tags);
                }
                AbilityCommand::RemoveTags(tags) => {
                    self.remove_tags(&tags);
                }
                AbilityCommand::ApplyBuffs(buffs) => {
                    self.apply_buffs(buffs);
                }
                AbilityCommand::RemoveBuffs(buffs) => {
                    self.remove_buffs(buffs);
                }
            }
        }
        self.hook_depth -= 1;
    }

    // ========================================================================
    // Slot helpers
    // ========================================================================

    fn state_of(&self, kind: &AbilityKind) -> Option<AbilityState> {
        self.abilities.get(kind).map(|slot| slot.machine.state())
    }

    fn config_of(&self, kind: &AbilityKind) -> Option<Arc<AbilityConfig>> {
        self.abilities.get(kind).map(|slot| Arc::clone(&slot.config))
    }

    fn machine_mut(&mut self, kind: &AbilityKind) -> Option<&mut AbilityMachine> {
        self.abilities.get_mut(kind).map(|slot| &mut slot.machine)
    }

    /// Installs `payload` as `kind`'s active payload, returning the previous one.
    fn push_payload(&mut self, kind: &AbilityKind, payload: PayloadBag) -> PayloadBag {
        self.machine_mut(kind)
            .map(|machine| machine.swap_payload(payload))
            .unwrap_or_default()
    }

    fn pop_payload(&mut self, kind: &AbilityKind, previous: PayloadBag) {
        if let Some(machine) = self.machine_mut(kind) {
            machine.swap_payload(previous);
        }
    }

    fn active_payload(&self, kind: &AbilityKind) -> PayloadBag {
        self.abilities
            .get(kind)
            .map(|slot| slot.machine.payload().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests;
