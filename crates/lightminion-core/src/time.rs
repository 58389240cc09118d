//! Time sources for fade scheduling
//!
//! Fade start instants arrive inside light documents as absolute timestamps
//! (seconds since the Unix epoch, on the clock of the hub that authored them).
//! A [`TimeSource`] answers "what time is it on that clock" and must be cheap
//! enough to call on every scheduler tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Time in seconds since the Unix epoch
pub type Timestamp = f64;

/// A source of the current time used to drive fades.
pub trait TimeSource: Send + Sync {
    /// Current time. Must not block.
    fn now(&self) -> Timestamp;

    /// Ask the source to refresh its reference, if it has one.
    ///
    /// Called by the scheduler on a coarse interval. Implementations must
    /// return immediately; a remote round trip has to run in the background.
    fn request_resync(&self) {}
}

/// Local monotonic clock anchored to the wall clock at construction.
///
/// Readings advance with [`Instant`], so wall clock adjustments after startup
/// never make fades jump backwards.
#[derive(Debug, Clone)]
pub struct LocalClock {
    epoch_at_origin: Timestamp,
    origin: Instant,
}

impl LocalClock {
    pub fn new() -> Self {
        let epoch_at_origin = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self {
            epoch_at_origin,
            origin: Instant::now(),
        }
    }
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for LocalClock {
    fn now(&self) -> Timestamp {
        self.epoch_at_origin + self.origin.elapsed().as_secs_f64()
    }
}

/// Manually driven clock for tests and offline replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.bits.store(now.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Offset between the local clock and a remote time authority.
///
/// Each round trip contributes one sample: the authority's reading is assumed
/// to have been taken halfway through the round trip, so the authority clock
/// at the moment the reply arrived is `authority_time + rtt / 2`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClockSync {
    offset: f64,
    latency: f64,
    samples: u64,
}

impl ClockSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one round trip.
    ///
    /// * `sent_at` / `received_at` - local clock readings around the query
    /// * `authority_time` - the authority's answer, in seconds
    pub fn record(&mut self, sent_at: Timestamp, received_at: Timestamp, authority_time: Timestamp) {
        let round_trip = (received_at - sent_at).max(0.0);
        self.latency = round_trip / 2.0;
        self.offset = authority_time + self.latency - received_at;
        self.samples += 1;
    }

    /// Translate a local reading into authority time.
    pub fn apply(&self, local_now: Timestamp) -> Timestamp {
        local_now + self.offset
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Estimated one-way latency from the last sample, in seconds.
    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Whether any sample has been recorded yet.
    pub fn is_synced(&self) -> bool {
        self.samples > 0
    }
}
