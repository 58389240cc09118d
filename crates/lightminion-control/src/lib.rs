//! LightMinion Control - Scheduling, Output and Hub I/O
//!
//! This crate connects the core output model to the outside world:
//! - **DMX**: Art-Net and sACN senders behind the [`DmxSink`] trait
//! - **Scheduler**: the fixed-rate loop that ticks fades and transmits frames
//! - **Clock**: a latency-compensated clock slaved to the hub
//! - **Hub**: identity registration and time queries
//! - **Feed**: newline-delimited JSON light change events
//!
//! ## Modules
//!
//! - [`dmx`] - DMX output via Art-Net and sACN
//! - [`scheduler`] - Fixed-rate frame loop
//! - [`clock`] - Remote clock
//! - [`hub`] - Hub client and identity handling
//! - [`feed`] - Light event feed
//! - [`error`] - Error types

#![allow(missing_docs)]

pub mod clock;
pub mod dmx;
pub mod error;
pub mod feed;
pub mod hub;
pub mod scheduler;

pub use clock::RemoteClock;
pub use dmx::{open_sink, ArtNetSender, DmxSink, SacnSender};
pub use error::{ControlError, Result};
pub use feed::{parse_line, run_feed, spawn_feed, FeedStats};
pub use hub::{ensure_identity, HttpHub, Hub, LocalHub, TimeAuthority};
pub use scheduler::{FrameScheduler, SchedulerConfig, SchedulerStats};
