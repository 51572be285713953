//! readalong - demo player binary
//!
//! Plays a manuscript JSON document from disk end-to-end using simulated
//! clips, logging every highlight and state transition. Useful for
//! exercising the engine against real manuscript/alignment payloads without
//! an audio subsystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use readalong::config::PlayerConfig;
use readalong::manuscript::Manuscript;
use readalong::playback::alignment::{AlignmentEntry, AlignmentSet};
use readalong::playback::clip::{AudioClip, TimedClip};
use readalong::playback::queue::{MediaResolver, PlaybackQueue};
use readalong::playback::PlaybackEngine;
use readalong::{PlayerEvent, SharedState};

/// Command-line arguments for readalong
#[derive(Parser, Debug)]
#[command(name = "readalong")]
#[command(about = "Narrated-document playback demo")]
#[command(version)]
struct Args {
    /// Path to the manuscript JSON document
    manuscript: PathBuf,

    /// Playback rate multiplier
    #[arg(short, long, default_value = "1.0", env = "READALONG_RATE")]
    rate: f64,

    /// Optional TOML configuration file
    #[arg(short, long, env = "READALONG_CONFIG")]
    config: Option<PathBuf>,
}

/// Resolves manuscript locators against local files
///
/// Audio clips are simulated: a clip's duration is taken from its sibling
/// alignment document (last fragment end plus a short tail), since nothing
/// here decodes audio.
struct FileResolver {
    base: PathBuf,
}

/// Trailing clip time after the last aligned fragment, milliseconds
const CLIP_TAIL_MS: u64 = 250;

/// Simulated duration for clips without alignment (the closing clip)
const UNALIGNED_CLIP_MS: u64 = 1_500;

impl FileResolver {
    fn path_for(&self, url: &str) -> PathBuf {
        self.base.join(url.trim_start_matches('/'))
    }

    fn read_alignment(&self, path: &Path) -> Result<AlignmentSet, readalong::Error> {
        let text = std::fs::read_to_string(path)?;
        let entries: Vec<AlignmentEntry> = serde_json::from_str(&text)?;
        Ok(AlignmentSet::new(entries))
    }
}

impl MediaResolver for FileResolver {
    fn resolve_clip(&self, url: &str) -> readalong::Result<Arc<dyn AudioClip>> {
        // Sibling alignment document gives the simulated duration
        let sidecar = self.path_for(url).with_extension("json");
        let duration_ms = match self.read_alignment(&sidecar) {
            Ok(alignment) => alignment.end_ms() + CLIP_TAIL_MS,
            Err(_) => {
                warn!(
                    "No alignment sidecar for {}; using {}ms",
                    url, UNALIGNED_CLIP_MS
                );
                UNALIGNED_CLIP_MS
            }
        };
        Ok(TimedClip::new(duration_ms))
    }

    fn resolve_alignment(&self, url: &str) -> readalong::Result<AlignmentSet> {
        self.read_alignment(&self.path_for(url))
            .map_err(|e| readalong::Error::Media(format!("{}: {}", url, e)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "readalong=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PlayerConfig::load(path).context("Failed to load configuration")?,
        None => PlayerConfig::default(),
    };

    let text = std::fs::read_to_string(&args.manuscript)
        .with_context(|| format!("Failed to read {}", args.manuscript.display()))?;
    let manuscript: Manuscript =
        serde_json::from_str(&text).context("Failed to parse manuscript")?;

    if let Some(title) = &manuscript.title {
        info!("Manuscript: {}", title);
    }

    let base = args
        .manuscript
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let resolver = FileResolver { base };
    let queue =
        PlaybackQueue::build(&manuscript, &resolver).context("Failed to build playback queue")?;
    info!("Playback queue: {} segments", queue.len());

    let state = Arc::new(SharedState::new());
    let mut events = state.subscribe_events();
    let engine = PlaybackEngine::new(&config, Arc::clone(&state));

    engine.load(queue).await;
    if (args.rate - 1.0).abs() > f64::EPSILON {
        engine.set_rate(args.rate).await?;
    }
    engine.play().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(PlayerEvent::HighlightActivated { fragment_id, .. }) => {
                        info!("highlight on  {}", fragment_id);
                    }
                    Ok(PlayerEvent::HighlightDeactivated { fragment_id, .. }) => {
                        info!("highlight off {}", fragment_id);
                    }
                    Ok(PlayerEvent::PlaybackEnded { .. }) => {
                        info!("Playback complete");
                        break;
                    }
                    Ok(event) => info!("{}", event.name()),
                    Err(e) => {
                        warn!("Event stream closed: {}", e);
                        break;
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                engine.pause().await;
                break;
            }
        }
    }

    Ok(())
}
