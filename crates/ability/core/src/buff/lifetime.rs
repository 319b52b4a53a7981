//! Buff lifetime timer table, swept once per tick.

use std::collections::BTreeMap;
use std::time::Duration;

use super::{BuffCount, BuffId};
use crate::time::GameTime;

#[derive(Debug, Default)]
pub struct LifetimeTable {
    expiries: BTreeMap<BuffId, GameTime>,
}

impl LifetimeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    /// Arms (or re-arms) timers for freshly applied buffs with a positive lifetime.
    pub fn start(&mut self, applied: &[BuffCount], now: GameTime) {
        for entry in applied {
            let lifetime = entry.buff.lifetime_duration();
            if lifetime > Duration::ZERO {
                self.expiries.insert(entry.id().clone(), now + lifetime);
            }
        }
    }

    pub fn reset(&mut self, removed: &[BuffCount]) {
        for entry in removed {
            self.expiries.remove(entry.id());
        }
    }

    pub fn clear(&mut self) {
        self.expiries.clear();
    }

    pub fn remaining(&self, id: &BuffId, now: GameTime) -> Option<Duration> {
        self.expiries.get(id).map(|expiry| expiry.saturating_until(now))
    }

    /// Drains every entry with `expiry <= now`, in id order.
    pub fn expire(&mut self, now: GameTime) -> Vec<BuffId> {
        let expired: Vec<BuffId> = self
            .expiries
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.expiries.remove(id);
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buff::BuffDef;

    #[test]
    fn only_non_stackable_buffs_with_lifetime_are_timed() {
        let timed = BuffDef::new("haste", "Speed")
            .with_lifetime(Duration::from_secs(2))
            .into_ref();
        let stacked = BuffDef::new("bleed", "Dot")
            .stackable()
            .with_lifetime(Duration::from_secs(2))
            .into_ref();
        let permanent = BuffDef::new("aura", "Aura").into_ref();

        let mut table = LifetimeTable::new();
        table.start(
            &[
                BuffCount::single(timed.clone()),
                BuffCount::single(stacked),
                BuffCount::single(permanent),
            ],
            GameTime::ZERO,
        );
        assert_eq!(table.len(), 1);

        let later = GameTime(Duration::from_millis(1500));
        assert_eq!(table.remaining(&timed.id, later), Some(Duration::from_millis(500)));
        assert!(table.expire(later).is_empty());
        assert_eq!(table.expire(GameTime(Duration::from_secs(2))), vec![timed.id.clone()]);
        assert!(table.is_empty());
    }

    #[test]
    fn reapplication_overwrites_expiry() {
        let timed = BuffDef::new("shield", "Shield")
            .with_lifetime(Duration::from_secs(1))
            .into_ref();
        let mut table = LifetimeTable::new();
        table.start(&[BuffCount::single(timed.clone())], GameTime::ZERO);
        table.start(&[BuffCount::single(timed.clone())], GameTime(Duration::from_millis(800)));
        assert!(table.expire(GameTime(Duration::from_secs(1))).is_empty());

        table.reset(&[BuffCount::single(timed)]);
        assert!(table.is_empty());
    }
}
