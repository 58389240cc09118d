//! Output engine: universe buffers, fades and reconciliation behind one owner
//!
//! The scheduler owns a single [`DmxEngine`] and interleaves change events
//! with ticks, so buffers and the fade set only ever have one writer.

use crate::fade::{FadeEngine, TickReport};
use crate::light::LightEvent;
use crate::reconcile::{LightReconciler, ReconcileReport, ReconcilerConfig};
use crate::time::Timestamp;
use crate::universe::{Frame, UniverseId, UniverseStore};

#[derive(Debug, Default)]
pub struct DmxEngine {
    universes: UniverseStore,
    fades: FadeEngine,
    reconciler: LightReconciler,
}

impl DmxEngine {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            universes: UniverseStore::new(),
            fades: FadeEngine::new(),
            reconciler: LightReconciler::new(config),
        }
    }

    /// Apply a light change notification at `now`
    pub fn apply(&mut self, event: LightEvent, now: Timestamp) -> Option<ReconcileReport> {
        self.reconciler
            .on_event(event, now, &mut self.universes, &mut self.fades)
    }

    /// Advance all fades to `now`
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        self.fades.tick(now, &mut self.universes)
    }

    /// Every known universe with its current buffer
    pub fn frames(&self) -> impl Iterator<Item = (UniverseId, &Frame)> {
        self.universes.iter()
    }

    pub fn universes(&self) -> &UniverseStore {
        &self.universes
    }

    pub fn universes_mut(&mut self) -> &mut UniverseStore {
        &mut self.universes
    }

    pub fn fades(&self) -> &FadeEngine {
        &self.fades
    }

    pub fn reconciler(&self) -> &LightReconciler {
        &self.reconciler
    }

    pub fn reconciler_mut(&mut self) -> &mut LightReconciler {
        &mut self.reconciler
    }
}
