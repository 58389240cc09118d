//! Newline-delimited JSON light feed
//!
//! Each line carries one change notification:
//!
//! ```text
//! {"event": "added",   "light": { "_id": "l1", ... }}
//! {"event": "changed", "light": { "_id": "l1", ... }}
//! {"event": "removed", "id": "l1"}
//! ```
//!
//! Lines that fail to parse are logged and skipped; they never stop the feed.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use lightminion_core::{Light, LightEvent};

use crate::Result;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum FeedMessage {
    Added { light: Light },
    Changed { light: Light },
    Removed { id: String },
}

impl From<FeedMessage> for LightEvent {
    fn from(message: FeedMessage) -> Self {
        match message {
            FeedMessage::Added { light } => LightEvent::Added(light),
            FeedMessage::Changed { light } => LightEvent::Changed(light),
            FeedMessage::Removed { id } => LightEvent::Removed { id },
        }
    }
}

/// Counters for a finished feed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    pub events: u64,
    pub malformed: u64,
}

/// Parse one feed line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<LightEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let message: FeedMessage = serde_json::from_str(line)?;
    Ok(Some(message.into()))
}

/// Forward events from `reader` until it ends or the receiver goes away.
pub async fn run_feed<R>(reader: R, events: mpsc::Sender<LightEvent>) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(Some(event)) => {
                if events.send(event).await.is_err() {
                    break;
                }
                stats.events += 1;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Skipping malformed feed line: {}", e);
                stats.malformed += 1;
            }
        }
    }

    info!(
        "Light feed ended ({} events, {} malformed)",
        stats.events, stats.malformed
    );
    Ok(stats)
}

/// Run [`run_feed`] on its own task
pub fn spawn_feed<R>(reader: R, events: mpsc::Sender<LightEvent>) -> JoinHandle<Result<FeedStats>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(run_feed(reader, events))
}
