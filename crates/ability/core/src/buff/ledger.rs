//! Effect ledger: active buffs, their counts and the class index.
//!
//! The ledger is pure bookkeeping. Apply/revert callbacks, tag deltas,
//! lifetimes and notifications are driven by the container around it.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use super::{BuffClass, BuffCount, BuffId, BuffRef};
use crate::error::LedgerError;

/// Outcome of classifying an apply batch against the ledger.
#[derive(Clone, Debug, Default)]
pub struct ApplyPlan {
    /// Entries to merge, in request order, with in-batch duplicates folded.
    pub accepted: Vec<BuffCount>,
    /// Active unique siblings displaced by a replacing buff.
    pub evictions: Vec<BuffRef>,
}

/// Result of subtracting applications from an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// The entry survives with a lower count.
    Partial { old: u32, new: u32 },
    /// The entry is gone.
    Full { old: u32 },
}

#[derive(Debug, Default)]
pub struct BuffLedger {
    entries: BTreeMap<BuffId, BuffCount>,
    classes: BTreeMap<BuffClass, BTreeSet<BuffId>>,
}

impl BuffLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &BuffId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &BuffId) -> Option<&BuffCount> {
        self.entries.get(id)
    }

    /// Active count, zero when the buff is not active.
    pub fn count(&self, id: &BuffId) -> u32 {
        self.entries.get(id).map_or(0, |entry| entry.count)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuffCount> + '_ {
        self.entries.values()
    }

    pub fn class_members(&self, class: &BuffClass) -> impl Iterator<Item = &BuffCount> + '_ {
        self.classes
            .get(class)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entries.get(id))
    }

    pub fn class_len(&self, class: &BuffClass) -> usize {
        self.classes.get(class).map_or(0, BTreeSet::len)
    }

    /// Classifies an apply batch without mutating anything.
    ///
    /// - zero counts and non-stackable buffs that are already active are skipped
    /// - a unique buff is accepted when nothing of its class is active or
    ///   pending; otherwise it is accepted only if it replaces previous
    ///   uniques, evicting the active members and dropping pending ones
    /// - an active unique buff conflicts with itself, so re-applying it is
    ///   refused or, when replacing, evicts and re-adds it at the new count
    pub fn plan_apply(&self, batch: &[BuffCount]) -> ApplyPlan {
        let mut plan = ApplyPlan::default();

        for entry in batch {
            let buff = &entry.buff;
            if entry.count == 0 {
                debug!(target: "ability::buffs", buff = %buff.id, "ignoring zero-count application");
                continue;
            }
            if let Some(pending) = plan.accepted.iter_mut().find(|p| p.id() == entry.id()) {
                if buff.stackable {
                    pending.count = pending.count.saturating_add(entry.count);
                }
                continue;
            }
            if !buff.stackable && self.contains(&buff.id) {
                continue;
            }

            if buff.unique {
                let active: Vec<BuffRef> = self
                    .class_members(&buff.class)
                    .filter(|sibling| !plan.evictions.iter().any(|e| e.id == *sibling.id()))
                    .map(|sibling| BuffRef::clone(&sibling.buff))
                    .collect();
                let pending = plan
                    .accepted
                    .iter()
                    .any(|p| p.buff.class == buff.class && p.id() != &buff.id);

                if !active.is_empty() || pending {
                    if !buff.replaces_previous_unique {
                        debug!(
                            target: "ability::buffs",
                            buff = %buff.id,
                            class = %buff.class,
                            "unique class already occupied"
                        );
                        continue;
                    }
                    plan.evictions.extend(active);
                    plan.accepted.retain(|p| p.buff.class != buff.class);
                }
            }

            plan.accepted.push(entry.clone());
        }

        plan
    }

    /// Adds applications, inserting the entry if needed. Returns `(old, new)` counts.
    pub(crate) fn add(&mut self, buff: &BuffRef, count: u32) -> (u32, u32) {
        let result = match self.entries.get_mut(&buff.id) {
            Some(entry) => {
                let old = entry.count;
                entry.count = old.saturating_add(count);
                (old, entry.count)
            }
            None => {
                self.entries
                    .insert(buff.id.clone(), BuffCount::new(BuffRef::clone(buff), count));
                self.classes
                    .entry(buff.class.clone())
                    .or_default()
                    .insert(buff.id.clone());
                (0, count)
            }
        };
        self.verify();
        result
    }

    /// Subtracts applications; at or below zero the entry is evicted.
    pub(crate) fn subtract(&mut self, id: &BuffId, count: u32) -> Option<Removal> {
        let entry = self.entries.get_mut(id)?;
        let old = entry.count;
        if old > count {
            entry.count = old - count;
            return Some(Removal::Partial {
                old,
                new: entry.count,
            });
        }
        self.evict(id);
        Some(Removal::Full { old })
    }

    /// Removes an entry from the ledger and its class index.
    pub(crate) fn evict(&mut self, id: &BuffId) -> Option<BuffCount> {
        let entry = self.entries.remove(id)?;
        let class = &entry.buff.class;
        let emptied = match self.classes.get_mut(class) {
            Some(members) => {
                members.remove(id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.classes.remove(class);
        }
        self.verify();
        Some(entry)
    }

    pub(crate) fn clear(&mut self) -> Vec<BuffCount> {
        self.classes.clear();
        core::mem::take(&mut self.entries).into_values().collect()
    }

    /// Checks that the class index mirrors the ledger exactly.
    pub fn check_consistency(&self) -> Result<(), LedgerError> {
        for (id, entry) in &self.entries {
            if entry.count == 0 {
                return Err(LedgerError::ZeroCount(id.clone()));
            }
            let indexed = self
                .classes
                .get(&entry.buff.class)
                .is_some_and(|members| members.contains(id));
            if !indexed {
                return Err(LedgerError::MissingFromClass {
                    buff: id.clone(),
                    class: entry.buff.class.clone(),
                });
            }
        }
        for (class, members) in &self.classes {
            for id in members {
                let matches = self
                    .entries
                    .get(id)
                    .is_some_and(|entry| entry.buff.class == *class);
                if !matches {
                    return Err(LedgerError::DanglingClassEntry {
                        buff: id.clone(),
                        class: class.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn verify(&self) {
        if let Err(err) = self.check_consistency() {
            error!(target: "ability::buffs", %err, "buff ledger diverged from class index");
            debug_assert!(false, "buff ledger diverged from class index: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buff::BuffDef;

    fn ledger_with(entries: &[(&BuffRef, u32)]) -> BuffLedger {
        let mut ledger = BuffLedger::new();
        for (buff, count) in entries {
            ledger.add(buff, *count);
        }
        ledger
    }

    #[test]
    fn non_stackable_reapplication_is_skipped() {
        let slow = BuffDef::new("slow", "Slow").into_ref();
        let ledger = ledger_with(&[(&slow, 1)]);
        let plan = ledger.plan_apply(&[BuffCount::single(slow)]);
        assert!(plan.accepted.is_empty());
    }

    #[test]
    fn occupied_unique_class_refuses_newcomer() {
        let fire = BuffDef::new("fire_stance", "Stance").unique(false).into_ref();
        let ice = BuffDef::new("ice_stance", "Stance").unique(false).into_ref();
        let ledger = ledger_with(&[(&fire, 1)]);

        let plan = ledger.plan_apply(&[BuffCount::single(ice)]);
        assert!(plan.accepted.is_empty());
        assert!(plan.evictions.is_empty());
    }

    #[test]
    fn replacing_unique_evicts_active_sibling() {
        let fire = BuffDef::new("fire_stance", "Stance").unique(true).into_ref();
        let ice = BuffDef::new("ice_stance", "Stance").unique(true).into_ref();
        let ledger = ledger_with(&[(&fire, 1)]);

        let plan = ledger.plan_apply(&[BuffCount::single(ice.clone())]);
        assert_eq!(plan.accepted, vec![BuffCount::single(ice)]);
        assert_eq!(plan.evictions.len(), 1);
        assert_eq!(plan.evictions[0].id, fire.id);
    }

    #[test]
    fn unique_siblings_in_one_batch_resolve_in_order() {
        let fire = BuffDef::new("fire_stance", "Stance").unique(false).into_ref();
        let ice = BuffDef::new("ice_stance", "Stance").unique(false).into_ref();
        let plan = BuffLedger::new()
            .plan_apply(&[BuffCount::single(fire.clone()), BuffCount::single(ice)]);
        assert_eq!(plan.accepted, vec![BuffCount::single(fire)]);
    }

    #[test]
    fn active_unique_refuses_its_own_reapplication() {
        let rage = BuffDef::new("rage", "Rage").stackable().unique(false).into_ref();
        let ledger = ledger_with(&[(&rage, 2)]);
        let plan = ledger.plan_apply(&[BuffCount::new(rage, 3)]);
        assert!(plan.accepted.is_empty());
        assert!(plan.evictions.is_empty());
    }

    #[test]
    fn replacing_unique_evicts_itself_before_reapplying() {
        let rage = BuffDef::new("rage", "Rage").stackable().unique(true).into_ref();
        let ledger = ledger_with(&[(&rage, 2)]);
        let plan = ledger.plan_apply(&[BuffCount::new(rage.clone(), 3)]);
        assert_eq!(plan.accepted.len(), 1);
        assert_eq!(plan.accepted[0].count, 3);
        assert_eq!(plan.evictions.len(), 1);
        assert_eq!(plan.evictions[0].id, rage.id);
    }

    #[test]
    fn duplicates_in_a_batch_fold_together() {
        let bleed = BuffDef::new("bleed", "Dot").stackable().into_ref();
        let plan = BuffLedger::new().plan_apply(&[
            BuffCount::new(bleed.clone(), 2),
            BuffCount::new(bleed.clone(), 0),
            BuffCount::new(bleed, 1),
        ]);
        assert_eq!(plan.accepted.len(), 1);
        assert_eq!(plan.accepted[0].count, 3);
    }

    #[test]
    fn subtract_distinguishes_partial_and_full() {
        let bleed = BuffDef::new("bleed", "Dot").stackable().into_ref();
        let mut ledger = ledger_with(&[(&bleed, 3)]);

        assert_eq!(ledger.subtract(&bleed.id, 1), Some(Removal::Partial { old: 3, new: 2 }));
        assert_eq!(ledger.subtract(&bleed.id, 5), Some(Removal::Full { old: 2 }));
        assert_eq!(ledger.subtract(&bleed.id, 1), None);
        assert_eq!(ledger.class_len(&bleed.class), 0);
        assert!(ledger.check_consistency().is_ok());
    }
}
