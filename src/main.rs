mod cache;
mod engine;
mod loader;
mod player;
mod render;
mod search;
mod state;
mod text_utils;
mod timeline;
mod ui;

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Lyrics source: an http(s) URL or a local file. Omit to open the search screen.
    pub source: Option<String>,
    /// Pipe the active lyric line to stdout (default is the full UI)
    #[arg(long)]
    pipe: bool,
    /// Base URL of the lyrics service used for search and processing.
    /// If unset, the VERSELINE_API env var will be used as a fallback.
    #[arg(long, value_name = "URL")]
    pub api_base: Option<String>,
    /// Silence length in seconds that separates word timelines into rows
    #[arg(long, value_name = "SECS", default_value_t = 1.0)]
    pub gap_threshold: f64,
    /// Playback clock poll interval in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 100)]
    pub tick_ms: u64,
    /// Song length in seconds, for sources that cannot report one
    #[arg(long, value_name = "SECS")]
    pub duration: Option<f64>,
    /// Path to a local payload cache file (optional)
    #[arg(long, value_name = "FILE")]
    pub cache: Option<PathBuf>,
    /// Start playing as soon as the lyrics are loaded
    #[arg(long)]
    pub autoplay: bool,
    /// Disable karaoke highlighting (per-unit). Use --no-karaoke to disable karaoke (default: enabled).
    #[arg(long = "no-karaoke")]
    pub no_karaoke: bool,
    /// Enable backend debug logging to stderr
    #[arg(long)]
    pub debug_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            pipe: false,
            api_base: None,
            gap_threshold: 1.0,
            tick_ms: 100,
            duration: None,
            cache: None,
            autoplay: false,
            no_karaoke: false,
            debug_log: false,
        }
    }
}

fn api_base_from_env_if_unset(cli: &mut Config) {
    if cli.api_base.is_none()
        && let Ok(s) = std::env::var("VERSELINE_API")
    {
        let trimmed = s.trim().to_string();
        if !trimmed.is_empty() {
            cli.api_base = Some(trimmed);
        }
    }
}

fn init_tracing(cfg: &Config) {
    let filter = if cfg.debug_log {
        tracing_subscriber::EnvFilter::new("verseline=debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut cfg = Config::parse();
    api_base_from_env_if_unset(&mut cfg);
    init_tracing(&cfg);

    let result = if cfg.pipe {
        match cfg.source.clone() {
            Some(locator) => ui::pipe::run_pipe(&cfg, locator).await,
            None => Err("pipe mode needs a lyrics source".into()),
        }
    } else {
        ui::run(&cfg).await
    };

    // Print error if any, for better diagnostics
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        return Err(e);
    }
    Ok(())
}
