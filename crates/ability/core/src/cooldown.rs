//! Cooldown timer table: one single-shot timer per ability type.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::ability::AbilityKind;
use crate::time::{GameTime, TimerHandle, TimerManager};

/// Why an ability's cooldown ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum CooldownReadyReason {
    /// The timer ran out.
    Finished,
    /// The cooldown was cleared early.
    Reset,
}

#[derive(Debug, Default)]
pub struct CooldownTable {
    timers: TimerManager<AbilityKind>,
    handles: HashMap<AbilityKind, TimerHandle>,
}

impl CooldownTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) the cooldown of `ability`.
    pub fn start(&mut self, ability: &AbilityKind, duration: Duration, now: GameTime) {
        if let Some(previous) = self.handles.remove(ability) {
            self.timers.clear_timer(previous);
        }
        let handle = self.timers.set_timer(now, duration, ability.clone());
        self.handles.insert(ability.clone(), handle);
        trace!(target: "ability::cooldown", %ability, ?duration, "cooldown started");
    }

    /// Cancels the cooldown, returning whether one was running.
    pub fn reset(&mut self, ability: &AbilityKind) -> bool {
        match self.handles.remove(ability) {
            Some(handle) => {
                self.timers.clear_timer(handle);
                debug!(target: "ability::cooldown", %ability, "cooldown reset");
                true
            }
            None => false,
        }
    }

    /// Drops every cooldown without notifying anyone.
    pub fn reset_all(&mut self) {
        self.handles.clear();
        self.timers.clear();
    }

    pub fn is_cooling_down(&self, ability: &AbilityKind) -> bool {
        self.handles.contains_key(ability)
    }

    pub fn remaining(&self, ability: &AbilityKind, now: GameTime) -> Duration {
        self.handles
            .get(ability)
            .and_then(|handle| self.timers.remaining(*handle, now))
            .unwrap_or_default()
    }

    /// Collects cooldowns due at `now`; their entries are removed before returning.
    pub fn expire(&mut self, now: GameTime) -> Vec<AbilityKind> {
        self.timers
            .expire(now)
            .into_iter()
            .map(|(handle, ability)| {
                if self.handles.get(&ability) == Some(&handle) {
                    self.handles.remove(&ability);
                }
                ability
            })
            .collect()
    }
}
