//! Buff API on top of the effect ledger.
//!
//! Only the authority mutates buffs through the public API and only the
//! authority runs apply/revert effects. Mirrors replay the replicated
//! changes as count bookkeeping.

use std::time::Duration;

use tracing::debug;

use super::AbilitySystem;
use crate::buff::{
    BuffClass, BuffCount, BuffId, BuffMatch, BuffOperation, BuffRef, EffectContext, Removal,
};
use crate::config::BuffReplication;
use crate::error::LedgerError;
use crate::events::SystemEvent;
use crate::net::{NetMessage, Route};
use crate::tags::Tag;

impl AbilitySystem {
    // ========================================================================
    // Mutators (authority only)
    // ========================================================================

    pub fn apply_buff(&mut self, buff: BuffRef, count: u32) -> bool {
        !self.apply_buffs([BuffCount::new(buff, count)]).is_empty()
    }

    /// Applies a batch, returning the subset that was actually applied.
    pub fn apply_buffs(&mut self, buffs: impl IntoIterator<Item = BuffCount>) -> Vec<BuffCount> {
        if !self.role.authority {
            debug!(target: "ability::buffs", peer = %self.peer, "apply requires authority");
            return Vec::new();
        }
        let batch: Vec<BuffCount> = buffs.into_iter().collect();
        let applied = self.apply_batch(&batch);
        self.notify_buffs(BuffOperation::Added, &applied);
        applied
    }

    /// Applies one application of each buff.
    pub fn apply_single_buffs(&mut self, buffs: impl IntoIterator<Item = BuffRef>) -> Vec<BuffCount> {
        self.apply_buffs(buffs.into_iter().map(BuffCount::single))
    }

    pub fn remove_buff(&mut self, buff: BuffRef, count: u32) -> bool {
        !self.remove_buffs([BuffCount::new(buff, count)]).is_empty()
    }

    /// Removes a batch, returning what was actually removed with the removed
    /// amounts. Removing an inactive buff is a no-op.
    pub fn remove_buffs(&mut self, buffs: impl IntoIterator<Item = BuffCount>) -> Vec<BuffCount> {
        if !self.role.authority {
            debug!(target: "ability::buffs", peer = %self.peer, "remove requires authority");
            return Vec::new();
        }
        let batch: Vec<BuffCount> = buffs.into_iter().collect();
        let removed = self.remove_batch(&batch);
        self.notify_buffs(BuffOperation::Removed, &removed);
        removed
    }

    /// Removes each buff entirely, whatever its count.
    pub fn remove_all_buffs(&mut self, buffs: impl IntoIterator<Item = BuffRef>) -> Vec<BuffCount> {
        self.remove_buffs(buffs.into_iter().map(|buff| BuffCount::new(buff, u32::MAX)))
    }

    /// Removes every active buff carrying `tag`. Without `exact`, child tags
    /// match too (`Status.Debuff.Stun` matches `Status.Debuff`).
    pub fn remove_buffs_by_tag(&mut self, tag: &Tag, exact: bool) -> Vec<BuffCount> {
        let matching: Vec<BuffRef> = self
            .ledger
            .iter()
            .filter(|entry| {
                if exact {
                    entry.buff.tags.contains(tag)
                } else {
                    entry.buff.tags.has_tag(tag)
                }
            })
            .map(|entry| BuffRef::clone(&entry.buff))
            .collect();
        if matching.is_empty() {
            return Vec::new();
        }
        self.remove_all_buffs(matching)
    }

    pub fn remove_buffs_of_class(&mut self, class: &BuffClass) -> Vec<BuffCount> {
        let members: Vec<BuffRef> = self
            .ledger
            .class_members(class)
            .map(|entry| BuffRef::clone(&entry.buff))
            .collect();
        if members.is_empty() {
            return Vec::new();
        }
        self.remove_all_buffs(members)
    }

    /// Reverts and drops every active buff.
    pub fn reset_buffs(&mut self) -> Vec<BuffCount> {
        if !self.role.authority {
            debug!(target: "ability::buffs", peer = %self.peer, "reset requires authority");
            return Vec::new();
        }
        let removed = self.ledger.clear();
        self.lifetimes.clear();
        for entry in &removed {
            self.revert_effects(&entry.buff, entry.count);
        }
        self.notify_buffs(BuffOperation::Removed, &removed);
        removed
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn has_buff(&self, id: &BuffId) -> bool {
        self.ledger.contains(id)
    }

    pub fn has_buffs(&self, ids: &[BuffId], mode: BuffMatch) -> bool {
        match mode {
            BuffMatch::All => ids.iter().all(|id| self.ledger.contains(id)),
            BuffMatch::Any => ids.iter().any(|id| self.ledger.contains(id)),
        }
    }

    /// Active count, zero when the buff is not active.
    pub fn buff_count(&self, id: &BuffId) -> u32 {
        self.ledger.count(id)
    }

    pub fn has_buff_of_class(&self, class: &BuffClass) -> bool {
        self.ledger.class_len(class) > 0
    }

    pub fn buffs_of_class(&self, class: &BuffClass) -> Vec<BuffCount> {
        self.ledger.class_members(class).cloned().collect()
    }

    pub fn all_buffs(&self) -> Vec<BuffCount> {
        self.ledger.iter().cloned().collect()
    }

    pub fn num_buffs(&self) -> usize {
        self.ledger.len()
    }

    /// Time left before a timed buff expires; `None` for buffs without a timer.
    pub fn buff_remaining_lifetime(&self, id: &BuffId) -> Option<Duration> {
        self.lifetimes.remaining(id, self.now)
    }

    pub fn check_ledger(&self) -> Result<(), LedgerError> {
        self.ledger.check_consistency()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Lifetime sweep. The authority removes expired buffs through the normal
    /// removal path; mirrors wait for the replicated removal.
    pub(super) fn expire_buffs(&mut self) {
        let expired: Vec<BuffRef> = self
            .lifetimes
            .expire(self.now)
            .iter()
            .filter_map(|id| self.ledger.get(id).map(|entry| BuffRef::clone(&entry.buff)))
            .collect();
        if expired.is_empty() || !self.role.authority {
            return;
        }
        debug!(target: "ability::buffs", peer = %self.peer, count = expired.len(), "buff lifetimes expired");
        self.remove_all_buffs(expired);
    }

    /// Replays a replicated change on a mirror. No effects run.
    pub(super) fn mirror_buffs(&mut self, operation: BuffOperation, buffs: Vec<BuffCount>) {
        let changed = match operation {
            BuffOperation::Added => self.apply_batch(&buffs),
            BuffOperation::Removed => self.remove_batch(&buffs),
        };
        if !changed.is_empty() {
            self.notify_buffs(operation, &changed);
        }
    }

    fn apply_batch(&mut self, batch: &[BuffCount]) -> Vec<BuffCount> {
        let authority = self.role.authority;
        let plan = self.ledger.plan_apply(batch);

        if !plan.evictions.is_empty() {
            if authority {
                let evicted: Vec<BuffCount> = plan
                    .evictions
                    .iter()
                    .map(|buff| BuffCount::new(BuffRef::clone(buff), u32::MAX))
                    .collect();
                let removed = self.remove_batch(&evicted);
                self.notify_buffs(BuffOperation::Removed, &removed);
            } else {
                let evicted: Vec<BuffCount> = plan
                    .evictions
                    .iter()
                    .filter_map(|buff| self.ledger.evict(&buff.id))
                    .collect();
                self.lifetimes.reset(&evicted);
            }
        }

        for entry in &plan.accepted {
            let old = self.ledger.count(entry.id());
            if authority && old > 0 {
                self.revert_effects(&entry.buff, old);
            }
            let (_, new) = self.ledger.add(&entry.buff, entry.count);
            if authority {
                self.apply_effects(&entry.buff, new);
            }
        }

        self.lifetimes.start(&plan.accepted, self.now);
        plan.accepted
    }

    fn remove_batch(&mut self, batch: &[BuffCount]) -> Vec<BuffCount> {
        let authority = self.role.authority;
        let mut removed = Vec::new();

        for entry in batch {
            if entry.count == 0 {
                continue;
            }
            let old = self.ledger.count(entry.id());
            if old > entry.count && authority {
                self.revert_effects(&entry.buff, old);
            }
            match self.ledger.subtract(entry.id(), entry.count) {
                None => continue,
                Some(Removal::Partial { old, new }) => {
                    if authority {
                        self.apply_effects(&entry.buff, new);
                    }
                    removed.push(BuffCount::new(BuffRef::clone(&entry.buff), old - new));
                }
                Some(Removal::Full { old }) => {
                    if authority {
                        self.revert_effects(&entry.buff, old);
                    }
                    removed.push(BuffCount::new(BuffRef::clone(&entry.buff), old));
                }
            }
        }

        self.lifetimes.reset(&removed);
        removed
    }

    fn apply_effects(&mut self, buff: &BuffRef, count: u32) {
        self.add_tags(&buff.tags_to_apply);
        self.add_tags(&buff.on_apply.add);
        self.remove_tags(&buff.on_apply.remove);
        if let Some(effects) = buff.effects.clone() {
            let delta = {
                let mut ctx = EffectContext::new(buff, &self.tags, self.now);
                effects.apply(&mut ctx, count);
                ctx.into_delta()
            };
            self.apply_tag_delta(&delta);
        }
    }

    fn revert_effects(&mut self, buff: &BuffRef, count: u32) {
        if let Some(effects) = buff.effects.clone() {
            let delta = {
                let mut ctx = EffectContext::new(buff, &self.tags, self.now);
                effects.revert(&mut ctx, count);
                ctx.into_delta()
            };
            self.apply_tag_delta(&delta);
        }
        self.remove_tags(&buff.tags_to_apply);
        self.add_tags(&buff.on_revert.add);
        self.remove_tags(&buff.on_revert.remove);
    }

    /// Local event, then replication according to the configured mode.
    fn notify_buffs(&mut self, operation: BuffOperation, buffs: &[BuffCount]) {
        if buffs.is_empty() {
            return;
        }
        debug!(
            target: "ability::buffs",
            peer = %self.peer,
            %operation,
            count = buffs.len(),
            "buffs changed"
        );
        self.events.push_back(match operation {
            BuffOperation::Added => SystemEvent::BuffsApplied(buffs.to_vec()),
            BuffOperation::Removed => SystemEvent::BuffsRemoved(buffs.to_vec()),
        });

        if !self.role.authority {
            return;
        }
        let route = match self.config.buff_replication {
            BuffReplication::None => return,
            BuffReplication::OwningClient => match self.owner {
                Some(owner) if !self.role.locally_controlled => Route::Peer(owner),
                _ => return,
            },
            BuffReplication::AllPeers => Route::AllPeers,
        };
        self.outbox.push(
            route,
            NetMessage::BuffsChanged {
                operation,
                buffs: buffs.iter().map(BuffCount::to_wire).collect(),
            },
        );
    }
}
