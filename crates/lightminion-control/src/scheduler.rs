//! Fixed-rate frame scheduler
//!
//! One task owns the [`DmxEngine`] and the [`DmxSink`]. Every period it:
//! 1. services the sink socket if it became readable
//! 2. asks the time source to resync (on a coarser interval)
//! 3. advances all fades
//! 4. transmits every known universe
//!
//! Light change events are applied on the same task between ticks, so the
//! engine has a single writer and frames are never observed half-updated.
//!
//! Cadence follows a target wake time rather than a fixed delay, so a slow
//! tick is absorbed by the next sleep. If the loop falls more than a full
//! period behind, the missed ticks are dropped and the next tick runs
//! immediately, so sustained overrun runs at the pace of the tick itself.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use lightminion_core::{DmxEngine, LightEvent, MinionConfig, TimeSource};

use crate::dmx::DmxSink;

/// Scheduler timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Tick period
    pub period: Duration,
    /// How often the time source is asked to resync
    pub resync_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(20), // 50 FPS
            resync_interval: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &MinionConfig) -> Self {
        Self {
            period: Duration::from_millis(config.tick_interval_ms),
            resync_interval: Duration::from_millis(config.resync_interval_ms),
        }
    }
}

/// Counters collected while running
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub frames_sent: u64,
    pub send_errors: u64,
    /// Times the loop fell a full period behind
    pub overruns: u64,
    pub events_applied: u64,
    pub fades_finished: u64,
}

pub struct FrameScheduler<S: DmxSink> {
    engine: DmxEngine,
    sink: S,
    clock: Arc<dyn TimeSource>,
    config: SchedulerConfig,
    last_resync: Option<Instant>,
    stats: SchedulerStats,
}

impl<S: DmxSink> FrameScheduler<S> {
    pub fn new(
        engine: DmxEngine,
        sink: S,
        clock: Arc<dyn TimeSource>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            engine,
            sink,
            clock,
            config,
            last_resync: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn engine(&self) -> &DmxEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut DmxEngine {
        &mut self.engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Apply a light change at the current time
    pub fn apply(&mut self, event: LightEvent) {
        let now = self.clock.now();
        if let Some(report) = self.engine.apply(event, now) {
            debug!("reconciled: {:?}", report);
        }
        self.stats.events_applied += 1;
    }

    /// Run one scheduler period. `at` is the instant the tick started.
    pub fn tick(&mut self, at: Instant) {
        match self.sink.poll_ready() {
            Ok(true) => {
                if let Err(e) = self.sink.socket_ready() {
                    debug!("Sink socket error: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => debug!("Sink poll error: {}", e),
        }

        let resync_due = self
            .last_resync
            .map_or(true, |last| at.duration_since(last) >= self.config.resync_interval);
        if resync_due {
            self.clock.request_resync();
            self.last_resync = Some(at);
        }

        let report = self.engine.tick(self.clock.now());
        self.stats.fades_finished += report.finished.len() as u64;

        for (universe, frame) in self.engine.frames() {
            match self.sink.send_frame(universe, frame) {
                Ok(()) => self.stats.frames_sent += 1,
                Err(e) => {
                    self.stats.send_errors += 1;
                    debug!("Failed to send universe {}: {}", universe, e);
                }
            }
        }

        self.stats.ticks += 1;
    }

    /// Drive the loop until `shutdown` turns true or its sender is dropped.
    ///
    /// The event channel closing is not a reason to stop: fades in flight
    /// and the last frames keep being transmitted.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<LightEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerStats {
        let period = self.config.period;
        let mut next_tick = Instant::now();
        let mut events_open = true;

        info!("Frame scheduler running at {:?} per tick", period);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                _ = tokio::time::sleep_until(next_tick) => {
                    self.tick(Instant::now());

                    next_tick += period;
                    let now = Instant::now();
                    if now >= next_tick + period {
                        self.stats.overruns += 1;
                        next_tick = now;
                    }
                }

                event = events.recv(), if events_open => {
                    match event {
                        Some(event) => self.apply(event),
                        None => {
                            info!("Light feed closed, continuing output");
                            events_open = false;
                        }
                    }
                }
            }
        }

        info!(
            "Frame scheduler stopped after {} ticks ({} frames, {} send errors, {} overruns)",
            self.stats.ticks, self.stats.frames_sent, self.stats.send_errors, self.stats.overruns
        );
        self.stats
    }
}
