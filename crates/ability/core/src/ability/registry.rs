//! Ability type registry.
//!
//! Every peer holds the same registry so mirrors can instantiate the
//! abilities the authority equips.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::{AbilityBehavior, AbilityConfig, DefaultBehavior};
use crate::name::name_type;

name_type! {
    /// Stable identifier of an ability type. One instance per type per container.
    AbilityKind
}

type Factory = Arc<dyn Fn() -> Box<dyn AbilityBehavior> + Send + Sync>;

/// Registered ability type: its static config and a behaviour factory.
#[derive(Clone)]
pub struct AbilityType {
    config: Arc<AbilityConfig>,
    factory: Factory,
}

impl AbilityType {
    pub fn config(&self) -> &Arc<AbilityConfig> {
        &self.config
    }

    pub fn instantiate(&self) -> Box<dyn AbilityBehavior> {
        (self.factory)()
    }
}

impl core::fmt::Debug for AbilityType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AbilityType")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Lookup table from [`AbilityKind`] to its [`AbilityType`].
#[derive(Clone, Debug, Default)]
pub struct AbilityRegistry {
    types: HashMap<AbilityKind, AbilityType>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an ability type, replacing any previous registration.
    pub fn register<F, B>(&mut self, kind: AbilityKind, config: AbilityConfig, factory: F)
    where
        F: Fn() -> B + Send + Sync + 'static,
        B: AbilityBehavior,
    {
        debug!(target: "ability::state", %kind, "registering ability type");
        self.types.insert(
            kind,
            AbilityType {
                config: Arc::new(config),
                factory: Arc::new(move || Box::new(factory()) as Box<dyn AbilityBehavior>),
            },
        );
    }

    /// Registers a data-only ability type using [`DefaultBehavior`].
    pub fn register_config(&mut self, kind: AbilityKind, config: AbilityConfig) {
        self.register(kind, config, || DefaultBehavior);
    }

    pub fn get(&self, kind: &AbilityKind) -> Option<&AbilityType> {
        self.types.get(kind)
    }

    pub fn contains(&self, kind: &AbilityKind) -> bool {
        self.types.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &AbilityKind> + '_ {
        self.types.keys()
    }
}
