//! Scripted simulations loaded from RON.
//!
//! A scenario declares the ability types and buff definitions every peer
//! shares, the authority's initial loadout, and a list of steps driven
//! against individual peers. Running it produces a [`ScenarioReport`] with
//! per-step outcomes and the final snapshot of every peer.

use std::path::Path;

use ability_core::{
    AbilityConfig, AbilityKind, AbilityRegistry, BuffCatalog, BuffCount, BuffCountWire, BuffDef,
    BuffId, BuffRef, InputSlot, PayloadBag, PeerId, Tag,
};
use serde::{Deserialize, Serialize};

use crate::api::{Result, RuntimeError};
use crate::config::SimulationConfig;
use crate::network::NetworkStats;
use crate::simulation::{PeerSnapshot, Simulation};

/// An ability type registered with the default behaviour.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilitySpec {
    pub kind: AbilityKind,
    #[serde(default)]
    pub config: AbilityConfig,
}

/// One scripted action. `peer` defaults to the authority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    Press {
        #[serde(default)]
        peer: u32,
        ability: AbilityKind,
        /// Falls back to the configured default slot.
        #[serde(default)]
        slot: Option<InputSlot>,
    },
    Release {
        #[serde(default)]
        peer: u32,
        slot: InputSlot,
    },
    CancelInput {
        #[serde(default)]
        peer: u32,
        slot: InputSlot,
    },
    Cast {
        #[serde(default)]
        peer: u32,
        ability: AbilityKind,
    },
    Activate {
        #[serde(default)]
        peer: u32,
        ability: AbilityKind,
    },
    Deactivate {
        #[serde(default)]
        peer: u32,
        ability: AbilityKind,
    },
    Cancel {
        #[serde(default)]
        peer: u32,
        ability: AbilityKind,
    },
    ApplyBuff {
        buff: BuffId,
        #[serde(default = "one")]
        count: u32,
    },
    RemoveBuff {
        buff: BuffId,
        #[serde(default = "one")]
        count: u32,
    },
    RemoveBuffsByTag {
        tag: Tag,
        #[serde(default)]
        exact: bool,
    },
    AddTag {
        tag: Tag,
    },
    RemoveTag {
        tag: Tag,
    },
    Equip {
        ability: AbilityKind,
    },
    Unequip {
        ability: AbilityKind,
    },
    /// Advances the simulation by this many tick intervals.
    Run {
        steps: u64,
    },
}

fn one() -> u32 {
    1
}

impl Step {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Scenario configuration for a scripted simulation.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub simulation: SimulationConfig,
    pub abilities: Vec<AbilitySpec>,
    pub buffs: Vec<BuffDef>,
    /// Equipped on the authority at start and replicated to the clients.
    pub initial_abilities: Vec<AbilityKind>,
    pub initial_buffs: Vec<BuffCountWire>,
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub step: &'static str,
    /// Whether the driven call reported success.
    pub accepted: bool,
    pub delivered: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScenarioReport {
    pub steps: Vec<StepRecord>,
    pub ticks: u64,
    pub elapsed_ms: u128,
    pub peers: Vec<PeerSnapshot>,
    /// Peers that disagree with the authority at the end of the run.
    pub diverged: Vec<PeerId>,
    pub network: NetworkStats,
}

impl Scenario {
    /// Load scenario from a RON file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::InvalidConfig(format!("Failed to read scenario file: {}", e))
        })?;

        Self::from_ron(&content)
    }

    pub fn from_ron(content: &str) -> Result<Self> {
        let scenario: Scenario = ron::from_str(content).map_err(|e| {
            RuntimeError::InvalidConfig(format!("Failed to parse scenario RON: {}", e))
        })?;
        scenario.simulation.validate()?;

        Ok(scenario)
    }

    pub fn registry(&self) -> AbilityRegistry {
        let mut registry = AbilityRegistry::new();
        for spec in &self.abilities {
            let mut config = spec.config.clone();
            if config.name.is_empty() {
                config.name = spec.kind.to_string();
            }
            registry.register_config(spec.kind.clone(), config);
        }
        registry
    }

    pub fn catalog(&self) -> BuffCatalog {
        let mut catalog = BuffCatalog::new();
        for def in &self.buffs {
            catalog.insert(def.clone());
        }
        catalog
    }

    /// Builds the simulation without starting it.
    pub fn build(&self) -> Result<Simulation> {
        let catalog = self.catalog();
        let initial_buffs = self
            .initial_buffs
            .iter()
            .map(|entry| Ok(BuffCount::new(lookup(&catalog, &entry.id)?, entry.count)))
            .collect::<Result<Vec<_>>>()?;

        Simulation::builder()
            .config(self.simulation.clone())
            .registry(self.registry())
            .catalog(catalog)
            .initial_abilities(self.initial_abilities.iter().cloned())
            .initial_buffs(initial_buffs)
            .build()
    }

    /// Builds, starts and drives the simulation through every step.
    pub fn run(&self) -> Result<ScenarioReport> {
        let mut simulation = self.build()?;
        simulation.start()?;

        tracing::info!(steps = self.steps.len(), "Running scenario");

        let mut records = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let (accepted, delivered) = execute(&mut simulation, step)?;
            tracing::debug!(index, step = step.name(), accepted, "step done");
            records.push(StepRecord {
                index,
                step: step.name(),
                accepted,
                delivered,
            });
        }

        Ok(ScenarioReport {
            steps: records,
            ticks: simulation.ticks(),
            elapsed_ms: simulation.now().as_duration().as_millis(),
            peers: simulation.snapshot(),
            diverged: simulation.diverged_peers(),
            network: simulation.network().stats(),
        })
    }
}

fn lookup(catalog: &BuffCatalog, id: &BuffId) -> Result<BuffRef> {
    catalog
        .get(id)
        .cloned()
        .ok_or_else(|| RuntimeError::UnknownBuff(id.clone()))
}

/// Runs one step, returning whether it was accepted and how many messages
/// the resulting pump delivered.
fn execute(simulation: &mut Simulation, step: &Step) -> Result<(bool, usize)> {
    if let Step::Run { steps } = step {
        return Ok((true, simulation.run(*steps)?));
    }

    let peer = match step {
        Step::Press { peer, .. }
        | Step::Release { peer, .. }
        | Step::CancelInput { peer, .. }
        | Step::Cast { peer, .. }
        | Step::Activate { peer, .. }
        | Step::Deactivate { peer, .. }
        | Step::Cancel { peer, .. } => PeerId(*peer),
        _ => Simulation::AUTHORITY,
    };

    let system = simulation.peer_mut(peer)?;
    let catalog = system.catalog().clone();
    let accepted = match step {
        Step::Press { ability, slot, .. } => {
            let slot = slot
                .clone()
                .unwrap_or_else(|| system.config().default_input.clone());
            system.press_input(ability, &slot)
        }
        Step::Release { slot, .. } => system.release_input(slot),
        Step::CancelInput { slot, .. } => system.cancel_input(slot).input_cancelled,
        Step::Cast { ability, .. } => system.start_cast(ability, PayloadBag::new()),
        Step::Activate { ability, .. } => system.activate(ability, PayloadBag::new()),
        Step::Deactivate { ability, .. } => system.deactivate(ability),
        Step::Cancel { ability, .. } => system.cancel(ability),
        Step::ApplyBuff { buff, count } => system.apply_buff(lookup(&catalog, buff)?, *count),
        Step::RemoveBuff { buff, count } => system.remove_buff(lookup(&catalog, buff)?, *count),
        Step::RemoveBuffsByTag { tag, exact } => {
            !system.remove_buffs_by_tag(tag, *exact).is_empty()
        }
        Step::AddTag { tag } => system.add_tag(tag.clone()),
        Step::RemoveTag { tag } => system.remove_tag(tag),
        Step::Equip { ability } => system.equip_ability(ability),
        Step::Unequip { ability } => system.unequip_ability(ability),
        Step::Run { .. } => true,
    };

    Ok((accepted, simulation.pump()?))
}
