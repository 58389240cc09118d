//! LightMinion - DMX512 output node
//!
//! Usage: `lightminion <config file>`
//!
//! Light change events are read as newline-delimited JSON from stdin. The
//! configuration file is rewritten on clean shutdown so an identity assigned
//! by the hub is kept for the next run.

mod logging_setup;

use anyhow::{Context, Result};
use lightminion_control::{
    ensure_identity, open_sink, spawn_feed, FrameScheduler, HttpHub, Hub, LocalHub, RemoteClock,
    SchedulerConfig,
};
use lightminion_core::{DmxEngine, LocalClock, MinionConfig, TimeSource, MINION_KIND};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Timeout for each hub request
const HUB_TIMEOUT: Duration = Duration::from_secs(5);
/// Delay between registration attempts while the hub is unreachable
const REGISTER_RETRY: Duration = Duration::from_secs(2);
/// Pending light events before the feed waits for the scheduler
const EVENT_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let Some(config_path) = std::env::args().nth(1).map(PathBuf::from) else {
        eprintln!("Usage: lightminion <config file>");
        std::process::exit(2);
    };

    let mut config = MinionConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;
    config.kind = MINION_KIND.to_string();

    let _log_guard = logging_setup::init(&config.effective_log_config())?;

    let http_hub = match &config.server {
        Some(url) => Some(Arc::new(
            HttpHub::new(url, HUB_TIMEOUT).context("Failed to create hub client")?,
        )),
        None => None,
    };
    let hub: Arc<dyn Hub> = match &http_hub {
        Some(hub) => hub.clone(),
        None => Arc::new(LocalHub),
    };

    let id = tokio::select! {
        id = register(&mut config, hub.as_ref()) => id,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted before registration completed");
            return Ok(());
        }
    };

    let clock: Arc<dyn TimeSource> = match http_hub {
        Some(hub) => Arc::new(RemoteClock::new(hub, HUB_TIMEOUT)),
        None => Arc::new(LocalClock::new()),
    };

    let sink = open_sink(&config.output).context("Failed to create DMX output")?;
    let engine = DmxEngine::new(config.reconciler_config());
    let scheduler = FrameScheduler::new(engine, sink, clock, SchedulerConfig::from_config(&config));

    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
    let (stop_tx, stop_rx) = watch::channel(false);

    let feed = spawn_feed(BufReader::new(tokio::io::stdin()), event_tx);
    let scheduler = tokio::spawn(scheduler.run(event_rx, stop_rx));

    info!("Minion {} running", id);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down...");

    // The scheduler may already be gone; nothing to stop then
    let _ = stop_tx.send(true);
    let stats = scheduler.await.context("Frame scheduler panicked")?;
    info!("Sent {} frames in {} ticks", stats.frames_sent, stats.ticks);
    feed.abort();

    save_config(&config, &config_path)
}

/// Register with the hub, retrying until it answers.
async fn register(config: &mut MinionConfig, hub: &dyn Hub) -> String {
    loop {
        match ensure_identity(config, hub).await {
            Ok(id) => return id,
            Err(e) => {
                warn!("Hub not reachable ({}), retrying in {:?}", e, REGISTER_RETRY);
                tokio::time::sleep(REGISTER_RETRY).await;
            }
        }
    }
}

fn save_config(config: &MinionConfig, path: &Path) -> Result<()> {
    config
        .save(path)
        .with_context(|| format!("Failed to save config {:?}", path))?;
    info!("Configuration saved to {:?}", path);
    Ok(())
}
