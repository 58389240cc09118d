//! Linear fade engine
//!
//! A [`Fade`] animates one channel slot from the level it had when the fade
//! was created to a target level. The [`FadeEngine`] holds at most one fade
//! per slot and advances all of them on every scheduler tick.
//!
//! A fade finishes as soon as its *rounded* level equals the target, which
//! can be slightly before the nominal duration has elapsed when the delta is
//! small. Sub-integer precision is invisible on an 8-bit output, so this is
//! intended.

use std::collections::BTreeMap;

use crate::time::Timestamp;
use crate::universe::{Slot, UniverseStore};

/// Lifecycle of a fade relative to a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    /// Start time is still in the future
    Pending,
    /// Interpolating
    Active,
    /// Reached the target level
    Finished,
}

/// One channel's in-flight transition
#[derive(Debug, Clone, PartialEq)]
pub struct Fade {
    slot: Slot,
    start: u8,
    current: f64,
    end: u8,
    start_time: Timestamp,
    duration: f64,
    finished: bool,
}

impl Fade {
    /// Create a fade for `slot` from `start` to `end`.
    ///
    /// Negative or non-finite durations are treated as zero (snap to target).
    pub fn new(slot: Slot, start: u8, end: u8, start_time: Timestamp, duration: f64) -> Self {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        Self {
            slot,
            start,
            current: start as f64,
            end,
            start_time,
            duration,
            finished: false,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    /// Unrounded interpolated level
    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn state(&self, now: Timestamp) -> FadeState {
        if self.finished {
            FadeState::Finished
        } else if now < self.start_time {
            FadeState::Pending
        } else {
            FadeState::Active
        }
    }

    /// Interpolation fraction at `now`, in [0, 1]
    pub fn fraction(&self, now: Timestamp) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.start_time) / self.duration).clamp(0.0, 1.0)
    }

    /// Level written to the output buffer
    pub fn level(&self) -> u8 {
        self.current.round().clamp(0.0, u8::MAX as f64) as u8
    }

    /// Whether this fade heads to the same target on the same schedule
    pub fn same_course(&self, end: u8, start_time: Timestamp, duration: f64) -> bool {
        self.end == end && self.start_time == start_time && self.duration == duration
    }

    /// Advance to `now`. Returns the level to write, or `None` while pending.
    pub fn advance(&mut self, now: Timestamp) -> Option<u8> {
        if now < self.start_time {
            return None;
        }

        let f = self.fraction(now);
        let start = self.start as f64;
        self.current = start + (self.end as f64 - start) * f;

        let level = self.level();
        if level == self.end {
            self.finished = true;
        }
        Some(level)
    }
}

/// Result of one [`FadeEngine::tick`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Number of slot writes performed
    pub written: usize,
    /// Slots whose fade finished (and was retired) on this tick
    pub finished: Vec<Slot>,
}

/// The set of currently animating slots
#[derive(Debug, Default, Clone)]
pub struct FadeEngine {
    fades: BTreeMap<Slot, Fade>,
}

impl FadeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fade, returning the one it replaced on the same slot
    pub fn register(&mut self, fade: Fade) -> Option<Fade> {
        let replaced = self.fades.insert(fade.slot, fade);
        if let Some(old) = &replaced {
            tracing::trace!("Replacing fade on {} (was heading to {})", old.slot, old.end);
        }
        replaced
    }

    /// Drop the fade on a slot, if any
    pub fn cancel(&mut self, slot: Slot) -> Option<Fade> {
        self.fades.remove(&slot)
    }

    pub fn get(&self, slot: Slot) -> Option<&Fade> {
        self.fades.get(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fade> {
        self.fades.values()
    }

    pub fn len(&self) -> usize {
        self.fades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fades.is_empty()
    }

    /// Advance every fade to `now`, writing levels into `store`.
    ///
    /// Fades that reach their target are removed once all fades have been
    /// written, so the final level is always in the buffer.
    pub fn tick(&mut self, now: Timestamp, store: &mut UniverseStore) -> TickReport {
        let mut report = TickReport::default();

        for fade in self.fades.values_mut() {
            if let Some(level) = fade.advance(now) {
                store.write(fade.slot, level);
                report.written += 1;
                if fade.finished {
                    report.finished.push(fade.slot);
                }
            }
        }

        for slot in &report.finished {
            self.fades.remove(slot);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::universe::{ChannelAddress, UniverseId};

    fn slot(address: u16) -> Slot {
        Slot::new(
            UniverseId::new(1).unwrap(),
            ChannelAddress::new(address).unwrap(),
        )
    }

    #[test]
    fn test_pending_fade_does_not_write() {
        let mut engine = FadeEngine::new();
        let mut store = UniverseStore::new();
        engine.register(Fade::new(slot(1), 0, 255, 10.0, 1.0));

        let report = engine.tick(9.5, &mut store);
        assert_eq!(report.written, 0);
        assert_eq!(store.get(slot(1)), 0);
        assert_eq!(engine.get(slot(1)).unwrap().state(9.5), FadeState::Pending);
    }

    #[test]
    fn test_linear_interpolation() {
        let mut engine = FadeEngine::new();
        let mut store = UniverseStore::new();
        engine.register(Fade::new(slot(3), 0, 200, 0.0, 2.0));

        engine.tick(0.5, &mut store);
        assert_eq!(store.get(slot(3)), 50);
        engine.tick(1.0, &mut store);
        assert_eq!(store.get(slot(3)), 100);
        engine.tick(2.0, &mut store);
        assert_eq!(store.get(slot(3)), 200);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_fade_down() {
        let mut fade = Fade::new(slot(1), 255, 0, 0.0, 1.0);
        assert_eq!(fade.advance(0.25), Some(191));
        assert_eq!(fade.advance(0.75), Some(64));
        assert_eq!(fade.advance(1.5), Some(0));
        assert!(fade.is_finished());
    }

    #[test]
    fn test_zero_duration_snaps() {
        let mut engine = FadeEngine::new();
        let mut store = UniverseStore::new();
        engine.register(Fade::new(slot(2), 10, 90, 5.0, 0.0));

        let report = engine.tick(5.0, &mut store);
        assert_eq!(store.get(slot(2)), 90);
        assert_eq!(report.finished, vec![slot(2)]);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_small_delta_finishes_early() {
        // 100 -> 101 over 10 s: at 6 s the level is 100.6, which rounds to 101
        let mut fade = Fade::new(slot(1), 100, 101, 0.0, 10.0);
        assert_eq!(fade.advance(6.0), Some(101));
        assert!(fade.is_finished());
    }

    #[test]
    fn test_register_replaces_same_slot() {
        let mut engine = FadeEngine::new();
        assert!(engine.register(Fade::new(slot(1), 0, 100, 0.0, 1.0)).is_none());
        let replaced = engine.register(Fade::new(slot(1), 40, 0, 0.5, 1.0));

        assert_eq!(replaced.unwrap().end(), 100);
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get(slot(1)).unwrap().start(), 40);
    }

    #[test]
    fn test_finished_removed_after_all_written() {
        let mut engine = FadeEngine::new();
        let mut store = UniverseStore::new();
        engine.register(Fade::new(slot(1), 0, 10, 0.0, 0.0));
        engine.register(Fade::new(slot(2), 0, 100, 0.0, 10.0));

        let report = engine.tick(1.0, &mut store);
        assert_eq!(report.written, 2);
        assert_eq!(report.finished, vec![slot(1)]);
        assert_eq!(store.get(slot(1)), 10);
        assert_eq!(store.get(slot(2)), 10);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_invalid_duration_is_zero() {
        let fade = Fade::new(slot(1), 0, 10, 0.0, f64::NAN);
        assert_eq!(fade.duration(), 0.0);
        let fade = Fade::new(slot(1), 0, 10, 0.0, -3.0);
        assert_eq!(fade.fraction(0.0), 1.0);
    }
}
