//! Latency-compensated remote clock
//!
//! [`RemoteClock`] serves `now()` from the local clock plus the offset learned
//! from the last round trip to a [`TimeAuthority`]. Resynchronisation runs on
//! a spawned task, so `now()` never waits on the network. When the authority
//! is unreachable the last known offset keeps being used.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use lightminion_core::{ClockSync, LocalClock, TimeSource, Timestamp};

use crate::hub::TimeAuthority;
use crate::{error::ControlError, Result};

pub struct RemoteClock {
    local: LocalClock,
    sync: Arc<RwLock<ClockSync>>,
    authority: Arc<dyn TimeAuthority>,
    in_flight: Arc<AtomicBool>,
    timeout: Duration,
}

impl RemoteClock {
    /// `timeout` bounds each round trip.
    pub fn new(authority: Arc<dyn TimeAuthority>, timeout: Duration) -> Self {
        Self {
            local: LocalClock::new(),
            sync: Arc::new(RwLock::new(ClockSync::new())),
            authority,
            in_flight: Arc::new(AtomicBool::new(false)),
            timeout,
        }
    }

    /// Snapshot of the current synchronisation state
    pub fn sync_state(&self) -> ClockSync {
        *self.sync.read()
    }

    /// Whether a background resync is currently running
    pub fn is_resyncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Perform one round trip and wait for it.
    pub async fn resync_now(&self) -> Result<ClockSync> {
        round_trip(&self.local, self.authority.as_ref(), &self.sync, self.timeout).await
    }
}

async fn round_trip(
    local: &LocalClock,
    authority: &dyn TimeAuthority,
    sync: &RwLock<ClockSync>,
    timeout: Duration,
) -> Result<ClockSync> {
    let sent_at = local.now();
    let authority_time = tokio::time::timeout(timeout, authority.server_time())
        .await
        .map_err(|_| ControlError::Timeout("time authority query".to_string()))??;
    let received_at = local.now();

    let mut state = sync.write();
    state.record(sent_at, received_at, authority_time);
    Ok(*state)
}

impl TimeSource for RemoteClock {
    fn now(&self) -> Timestamp {
        self.sync.read().apply(self.local.now())
    }

    /// Start a background round trip unless one is already running.
    fn request_resync(&self) {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available for time resync");
            self.in_flight.store(false, Ordering::Release);
            return;
        };

        let local = self.local.clone();
        let sync = Arc::clone(&self.sync);
        let authority = Arc::clone(&self.authority);
        let in_flight = Arc::clone(&self.in_flight);
        let timeout = self.timeout;

        runtime.spawn(async move {
            match round_trip(&local, authority.as_ref(), &sync, timeout).await {
                Ok(state) => debug!(
                    "Time resync: offset {:.4}s, latency {:.4}s",
                    state.offset(),
                    state.latency()
                ),
                Err(e) => debug!("Time resync failed, keeping last offset: {}", e),
            }
            in_flight.store(false, Ordering::Release);
        });
    }
}
