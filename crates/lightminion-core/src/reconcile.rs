//! Light reconciliation
//!
//! Turns light change notifications into buffer writes and fades. Each
//! channel of a light is handled on its own: a channel that cannot be
//! resolved (bad address, no authored value) is skipped without affecting its
//! siblings.

use std::collections::HashMap;
use tracing::debug;

use crate::fade::{Fade, FadeEngine};
use crate::light::{Light, LightEvent, ValueEncoding};
use crate::time::Timestamp;
use crate::universe::{Slot, UniverseStore};

/// Reconciler settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilerConfig {
    /// Only lights assigned to this identity are output. `None` accepts all.
    pub identity: Option<String>,
    pub encoding: ValueEncoding,
    /// Skip lights without a non-empty `settings` block
    pub require_settings: bool,
}

/// What happened to a light as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Channels were reconciled
    Applied,
    /// No `settings` block yet, or an empty one
    Unconfigured,
    /// Assigned to another minion
    NotOwned,
    /// Identical to the last document seen for this id
    Unchanged,
}

/// Outcome of reconciling one light
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub disposition: Disposition,
    /// Channels written immediately
    pub written: usize,
    /// Fades created or replaced
    pub faded: usize,
    /// Channels already at their target
    pub unchanged: usize,
    /// Channels skipped (bad address or universe, no value)
    pub skipped: usize,
}

impl ReconcileReport {
    fn new(disposition: Disposition) -> Self {
        Self {
            disposition,
            written: 0,
            faded: 0,
            unchanged: 0,
            skipped: 0,
        }
    }
}

/// Resolves light documents into output state
#[derive(Debug, Default)]
pub struct LightReconciler {
    config: ReconcilerConfig,
    snapshots: HashMap<String, Light>,
}

impl LightReconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            snapshots: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn identity(&self) -> Option<&str> {
        self.config.identity.as_deref()
    }

    pub fn set_identity(&mut self, identity: Option<String>) {
        if self.config.identity != identity {
            // Ownership changed, so previously ignored lights must be re-evaluated
            self.snapshots.clear();
        }
        self.config.identity = identity;
    }

    /// Number of lights with a remembered snapshot
    pub fn known_lights(&self) -> usize {
        self.snapshots.len()
    }

    /// Forget the snapshot of a light. Output levels are left as they are.
    pub fn forget(&mut self, id: &str) -> bool {
        self.snapshots.remove(id).is_some()
    }

    /// Dispatch a change notification
    pub fn on_event(
        &mut self,
        event: LightEvent,
        now: Timestamp,
        store: &mut UniverseStore,
        fades: &mut FadeEngine,
    ) -> Option<ReconcileReport> {
        match event {
            LightEvent::Added(light) | LightEvent::Changed(light) => {
                Some(self.on_change(light, now, store, fades))
            }
            LightEvent::Removed { id } => {
                if self.forget(&id) {
                    debug!("light removed: {}", id);
                }
                None
            }
        }
    }

    /// Reconcile one light create/update.
    pub fn on_change(
        &mut self,
        light: Light,
        now: Timestamp,
        store: &mut UniverseStore,
        fades: &mut FadeEngine,
    ) -> ReconcileReport {
        if self.config.require_settings && !light.is_configured() {
            return ReconcileReport::new(Disposition::Unconfigured);
        }

        if let Some(identity) = self.config.identity.as_deref() {
            if light.minion.as_deref() != Some(identity) {
                return ReconcileReport::new(Disposition::NotOwned);
            }
        }

        if self.snapshots.get(&light.id) == Some(&light) {
            return ReconcileReport::new(Disposition::Unchanged);
        }

        debug!("light changed: {}", light.label());

        let mut report = ReconcileReport::new(Disposition::Applied);
        let duration = light.fade_duration();
        let start_time = light.fade_start(now);

        for (position, channel) in light.channels.iter().enumerate() {
            let slot = match channel.slot() {
                Ok(slot) => slot,
                Err(e) => {
                    debug!("{}: skipping channel {}: {}", light.id, position, e);
                    report.skipped += 1;
                    continue;
                }
            };

            store.get_or_create(slot.universe);

            let Some(value) = light
                .values
                .as_ref()
                .and_then(|v| v.resolve(position, channel.kind.as_deref()))
            else {
                debug!("{}: no value for channel {} ({})", light.id, position, slot);
                report.skipped += 1;
                continue;
            };

            let target = self.config.encoding.to_level(value);
            let current = store.get(slot);

            match duration {
                Some(duration) => {
                    if fades
                        .get(slot)
                        .is_some_and(|f| f.same_course(target, start_time, duration))
                    {
                        report.unchanged += 1;
                        continue;
                    }
                    if target == current {
                        // Already there; a fade still heading elsewhere is stale
                        fades.cancel(slot);
                        report.unchanged += 1;
                        continue;
                    }
                    fades.register(Fade::new(slot, current, target, start_time, duration));
                    report.faded += 1;
                }
                None => {
                    fades.cancel(slot);
                    if target == current {
                        report.unchanged += 1;
                        continue;
                    }
                    store.write(slot, target);
                    report.written += 1;
                }
            }
        }

        self.snapshots.insert(light.id.clone(), light);
        report
    }
}
