//! Simulation clock and single-shot timers.
//!
//! The container owns its clock; the host advances it through
//! `AbilitySystem::tick`. Timers never fire during the pass that armed them,
//! so a zero-length timer is ready on the next tick.

use std::collections::BTreeMap;
use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Elapsed simulation time since the container was created.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GameTime(pub Duration);

impl GameTime {
    pub const ZERO: Self = Self(Duration::ZERO);

    pub fn from_secs_f32(secs: f32) -> Self {
        Self(Duration::from_secs_f32(secs.max(0.0)))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    /// Time left until `self`, zero once `now` has passed it.
    pub fn saturating_until(self, now: GameTime) -> Duration {
        self.0.saturating_sub(now.0)
    }
}

impl Add<Duration> for GameTime {
    type Output = GameTime;

    fn add(self, rhs: Duration) -> GameTime {
        GameTime(self.0.saturating_add(rhs))
    }
}

impl core::fmt::Display for GameTime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}

/// Opaque handle to a pending timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

#[derive(Clone, Debug)]
struct Timer<T> {
    armed_at: GameTime,
    expires_at: GameTime,
    payload: T,
}

/// Single-shot timers carrying a payload that is returned on expiry.
#[derive(Clone, Debug)]
pub struct TimerManager<T> {
    next_handle: u64,
    timers: BTreeMap<TimerHandle, Timer<T>>,
}

impl<T> Default for TimerManager<T> {
    fn default() -> Self {
        Self {
            next_handle: 1,
            timers: BTreeMap::new(),
        }
    }
}

impl<T> TimerManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn set_timer(&mut self, now: GameTime, duration: Duration, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.timers.insert(
            handle,
            Timer {
                armed_at: now,
                expires_at: now + duration,
                payload,
            },
        );
        handle
    }

    /// Cancels a timer, returning its payload if it was still pending.
    pub fn clear_timer(&mut self, handle: TimerHandle) -> Option<T> {
        self.timers.remove(&handle).map(|timer| timer.payload)
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.contains_key(&handle)
    }

    pub fn remaining(&self, handle: TimerHandle, now: GameTime) -> Option<Duration> {
        self.timers
            .get(&handle)
            .map(|timer| timer.expires_at.saturating_until(now))
    }

    /// Removes and returns every timer due at `now`, ordered by expiry.
    ///
    /// Timers armed at `now` are left for a later pass.
    pub fn expire(&mut self, now: GameTime) -> Vec<(TimerHandle, T)> {
        let mut due: Vec<(GameTime, TimerHandle)> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.expires_at <= now && timer.armed_at < now)
            .map(|(handle, timer)| (timer.expires_at, *handle))
            .collect();
        due.sort();

        due.into_iter()
            .filter_map(|(_, handle)| {
                self.timers
                    .remove(&handle)
                    .map(|timer| (handle, timer.payload))
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> GameTime {
        GameTime(Duration::from_millis(millis))
    }

    #[test]
    fn timers_fire_in_expiry_order() {
        let mut timers = TimerManager::new();
        timers.set_timer(at(0), Duration::from_millis(300), "late");
        timers.set_timer(at(0), Duration::from_millis(100), "early");

        assert!(timers.expire(at(50)).is_empty());
        let fired: Vec<_> = timers.expire(at(400)).into_iter().map(|(_, p)| p).collect();
        assert_eq!(fired, vec!["early", "late"]);
        assert!(timers.is_empty());
    }

    #[test]
    fn zero_length_timer_waits_for_next_pass() {
        let mut timers = TimerManager::new();
        let handle = timers.set_timer(at(100), Duration::ZERO, ());
        assert!(timers.expire(at(100)).is_empty());
        assert_eq!(timers.remaining(handle, at(100)), Some(Duration::ZERO));
        assert_eq!(timers.expire(at(116)).len(), 1);
    }

    #[test]
    fn cleared_timer_never_fires() {
        let mut timers = TimerManager::new();
        let handle = timers.set_timer(at(0), Duration::from_millis(10), 5u8);
        assert_eq!(timers.clear_timer(handle), Some(5));
        assert_eq!(timers.clear_timer(handle), None);
        assert!(timers.expire(at(20)).is_empty());
    }
}
