// engine.rs: Playback task: owns the media source and the sync state

use crate::cache::PayloadCache;
use crate::loader::{self, LoadError, LoadedLyrics};
use crate::player::{self, MediaSource};
use crate::state::{SyncEngine, Update};
use crate::timeline::{GroupingStrategy, Timeline};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, warn};

/// Transport requests from a display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePlay,
    Restart,
    SeekTo(f64),
    SeekBy(f64),
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub gap_threshold: f64,
    pub tick: Duration,
    /// Playable length override; otherwise the timeline's own extent is used.
    pub duration_override: Option<f64>,
    pub cache_path: Option<PathBuf>,
    pub autoplay: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            gap_threshold: 1.0,
            tick: Duration::from_millis(100),
            duration_override: None,
            cache_path: None,
            autoplay: false,
        }
    }
}

/// Drive playback against a media source: load the timeline, then fold
/// clock ticks and transport commands into state snapshots for the UI.
/// Ends when the command channel closes.
pub async fn run<S: MediaSource + Send>(
    mut source: S,
    locator: String,
    opts: EngineOptions,
    update_tx: mpsc::Sender<Update>,
    mut cmd_rx: mpsc::Receiver<Command>,
) {
    let mut state = SyncEngine::new();
    let mut cache = open_cache(&opts);
    match load_timeline(&locator, &opts, cache.as_mut()).await {
        Ok(loaded) => state.install_timeline(loaded.timeline, loaded.grouping, None),
        Err(e) => {
            warn!(source = %locator, error = %e, "timeline load failed");
            state.install_timeline(Timeline::default(), GroupingStrategy::Explicit, Some(e.to_string()));
        }
    }

    // A source that knows its own length wins; otherwise fall back to the
    // override or the last unit's end.
    let effective_duration = if source.duration() > 0.0 {
        source.duration()
    } else {
        opts.duration_override
            .unwrap_or_else(|| state.timeline().duration_hint())
    };
    state.set_duration(effective_duration);
    if opts.autoplay {
        source.play();
    }
    state.sync_to(!source.paused(), source.position());

    let mut last_sent = 0u64;
    send_update(&state, &update_tx, &mut last_sent, true).await;

    let mut ticker = tokio::time::interval(opts.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                debug!(?cmd, "transport command");
                let resync_now = apply_command(cmd, &mut source, &mut state, effective_duration);
                if resync_now {
                    state.sync_to(!source.paused(), source.position());
                }
                send_update(&state, &update_tx, &mut last_sent, true).await;
            }

            _ = ticker.tick() => {
                let mut position = source.position();
                if effective_duration > 0.0 && position >= effective_duration {
                    position = effective_duration;
                    if !source.paused() {
                        source.pause();
                        source.seek(effective_duration);
                    }
                }
                if state.sync_to(!source.paused(), position) {
                    send_update(&state, &update_tx, &mut last_sent, false).await;
                }
            }
        }
    }
}

/// Apply a transport command to the source. Returns whether the caller
/// should re-resolve immediately; a restart sends its cleared snapshot
/// first and leaves resolution to the next tick, so the highlight drop and
/// re-light arrive as two distinct changes.
fn apply_command<S: MediaSource>(
    cmd: Command,
    source: &mut S,
    state: &mut SyncEngine,
    duration: f64,
) -> bool {
    match cmd {
        Command::TogglePlay => {
            if source.paused() {
                if duration > 0.0 && source.position() >= duration {
                    // Playing again from the end starts the song over.
                    source.seek(0.0);
                    state.rewind();
                }
                source.play();
            } else {
                source.pause();
            }
            true
        }
        Command::Restart => {
            source.seek(0.0);
            state.rewind();
            false
        }
        Command::SeekTo(target) => {
            source.seek(clamp_position(target, duration));
            true
        }
        Command::SeekBy(delta) => {
            source.seek(clamp_position(source.position() + delta, duration));
            true
        }
    }
}

fn clamp_position(target: f64, duration: f64) -> f64 {
    let target = player::sanitize_position(target);
    if duration > 0.0 { target.min(duration) } else { target }
}

async fn send_update(
    state: &SyncEngine,
    update_tx: &mpsc::Sender<Update>,
    last_sent: &mut u64,
    force: bool,
) {
    let snapshot = state.snapshot();
    let version = snapshot.version;
    if !force && version == *last_sent {
        return;
    }
    if update_tx.send(snapshot).await.is_ok() {
        *last_sent = version;
    }
}

fn open_cache(opts: &EngineOptions) -> Option<PayloadCache> {
    let path = opts.cache_path.as_ref()?;
    match PayloadCache::load(path) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(error = %e, "payload cache unreadable, starting empty");
            Some(PayloadCache::default())
        }
    }
}

/// Serve the payload from the cache when possible, otherwise fetch it and
/// remember it for next time.
async fn load_timeline(
    source: &str,
    opts: &EngineOptions,
    cache: Option<&mut PayloadCache>,
) -> Result<LoadedLyrics, LoadError> {
    let Some(cache) = cache else {
        return loader::load(source, opts.gap_threshold).await;
    };
    if let Some(raw) = cache.get(source) {
        debug!(source, "timeline served from cache");
        return loader::parse_payload(&raw, opts.gap_threshold);
    }
    let raw = loader::fetch_payload(source).await?;
    let loaded = loader::parse_payload(&raw, opts.gap_threshold)?;
    cache.insert(source, &raw);
    if let Some(path) = &opts.cache_path
        && let Err(e) = cache.save(path)
    {
        warn!(error = %e, "failed to persist payload cache");
    }
    Ok(loaded)
}
