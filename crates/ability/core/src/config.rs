use serde::{Deserialize, Serialize};

use crate::input::InputSlot;

/// Who receives buff change notifications from the authority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuffReplication {
    /// Buffs stay on the authority.
    None,
    /// Only the owning client mirrors buffs, and only when it is a remote peer.
    OwningClient,
    /// Every peer mirrors buffs.
    #[default]
    AllPeers,
}

/// Container configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Buff replication policy, fixed at construction.
    pub buff_replication: BuffReplication,

    /// Slot used by gameplay code that does not name one.
    pub default_input: InputSlot,

    /// How deep ability commands may chain into further hooks before being dropped.
    pub max_hook_depth: usize,
}

impl CoreConfig {
    // ===== runtime-tunable defaults =====
    pub const DEFAULT_INPUT: &'static str = "Default";
    pub const DEFAULT_MAX_HOOK_DEPTH: usize = 16;

    pub fn new() -> Self {
        Self {
            buff_replication: BuffReplication::default(),
            default_input: InputSlot::new(Self::DEFAULT_INPUT),
            max_hook_depth: Self::DEFAULT_MAX_HOOK_DEPTH,
        }
    }

    pub fn with_buff_replication(mut self, buff_replication: BuffReplication) -> Self {
        self.buff_replication = buff_replication;
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
