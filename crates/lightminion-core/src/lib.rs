//! LightMinion Core - Output State and Fade Engine
//!
//! This crate contains the in-memory model behind a lighting minion:
//! - Universe buffers (512 8-bit channels each, created on first use)
//! - Linear fades advanced on every scheduler tick
//! - Light documents and their reconciliation into buffer writes and fades
//! - Time sources (local clock, remote clock offset math)
//! - Persisted configuration and logging settings
//!
//! It has no async runtime dependency; scheduling and transmission live in
//! `lightminion-control`.

#![allow(missing_docs)]

pub mod config;
pub mod engine;
pub mod error;
pub mod fade;
pub mod light;
pub mod logging;
pub mod reconcile;
pub mod time;
pub mod universe;

// Configuration
pub use config::{MinionConfig, OutputConfig, Protocol, MINION_KIND};
pub use logging::LogConfig;

// Output state
pub use engine::DmxEngine;
pub use fade::{Fade, FadeEngine, FadeState, TickReport};
pub use universe::{ChannelAddress, Frame, Slot, UniverseId, UniverseStore, UNIVERSE_SIZE};

// Documents
pub use light::{FadeSettings, Light, LightChannel, LightEvent, LightValues, ValueEncoding};
pub use reconcile::{Disposition, LightReconciler, ReconcileReport, ReconcilerConfig};

// Time
pub use time::{ClockSync, LocalClock, ManualClock, TimeSource, Timestamp};

pub use error::{CoreError, Result};
