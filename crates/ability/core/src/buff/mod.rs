//! Buffs (status effects): definitions, the effect ledger and lifetimes.

mod catalog;
mod def;
mod ledger;
mod lifetime;

use serde::{Deserialize, Serialize};

pub use catalog::BuffCatalog;
pub use def::{
    BuffClass, BuffCount, BuffCountWire, BuffDef, BuffEffects, BuffId, BuffRef, EffectContext,
};
pub use ledger::{ApplyPlan, BuffLedger, Removal};
pub use lifetime::LifetimeTable;

/// Direction of a buff change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum BuffOperation {
    Added,
    Removed,
}

/// Matching mode for multi-buff queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BuffMatch {
    #[default]
    All,
    Any,
}
