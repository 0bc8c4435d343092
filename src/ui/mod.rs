pub mod pipe;
pub mod player;
pub mod search;
pub mod styles;

use crate::engine::EngineOptions;
use crossterm::event::Event;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Where the screen loop goes after a screen returns.
pub(crate) enum Next {
    Search,
    Player { locator: String, title: String },
    Quit,
}

pub(crate) fn engine_options(cfg: &crate::Config) -> EngineOptions {
    EngineOptions {
        gap_threshold: cfg.gap_threshold,
        tick: Duration::from_millis(cfg.tick_ms.max(10)),
        duration_override: cfg.duration,
        cache_path: cfg.cache.clone(),
        autoplay: cfg.autoplay,
    }
}

/// Display title for a locator: the file stem of a path, or the last
/// path segment of a URL, with the query string dropped.
pub(crate) fn title_for(locator: &str) -> String {
    let tail = locator
        .rsplit('/')
        .next()
        .unwrap_or(locator)
        .split('?')
        .next()
        .unwrap_or_default();
    let stem = tail.rsplit_once('.').map(|(s, _)| s).unwrap_or(tail);
    if stem.is_empty() {
        locator.to_string()
    } else {
        stem.to_string()
    }
}

/// Full-screen terminal loop. Raw mode and the alternate screen are torn
/// down before the result is surfaced so an error never leaves the
/// terminal unusable.
pub async fn run(cfg: &crate::Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    enable_raw_mode().map_err(to_boxed_err)?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(to_boxed_err)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(to_boxed_err)?;
    let mut input_rx = spawn_input_thread();

    let result = run_screens(&mut terminal, &mut input_rx, cfg).await;

    disable_raw_mode().map_err(to_boxed_err)?;
    execute!(io::stdout(), LeaveAlternateScreen).map_err(to_boxed_err)?;
    result
}

async fn run_screens(
    terminal: &mut Tui,
    input_rx: &mut mpsc::Receiver<Event>,
    cfg: &crate::Config,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut next = match &cfg.source {
        Some(locator) => Next::Player {
            locator: locator.clone(),
            title: title_for(locator),
        },
        None => Next::Search,
    };
    loop {
        next = match next {
            Next::Search => search::run_search(terminal, input_rx, cfg).await?,
            Next::Player { locator, title } => {
                player::run_player(terminal, input_rx, cfg, locator, title).await?
            }
            Next::Quit => return Ok(()),
        };
    }
}

// Single background thread to poll for crossterm events and forward them
// to the async runtime. This avoids repeatedly calling
// `tokio::task::spawn_blocking` which grows the blocking threadpool when
// the UI wakes frequently (e.g. during scroll glides).
fn spawn_input_thread() -> mpsc::Receiver<Event> {
    let (event_tx, event_rx) = mpsc::channel(32);
    thread::spawn(move || {
        loop {
            // Poll with a short timeout to remain responsive.
            match crossterm::event::poll(Duration::from_millis(100)) {
                Ok(true) => match crossterm::event::read() {
                    Ok(ev) => {
                        // If the async receiver is gone, stop the thread.
                        if event_tx.try_send(ev).is_err() && event_tx.is_closed() {
                            break;
                        }
                    }
                    Err(_) => {
                        // ignore and continue polling
                    }
                },
                Ok(false) => {
                    // timeout, continue
                }
                Err(_) => {
                    // on error, sleep a bit to avoid a busy loop
                    thread::sleep(Duration::from_millis(100));
                }
            }
        }
    });
    event_rx
}

pub(crate) fn to_boxed_err<E: std::error::Error + Send + Sync + 'static>(
    e: E,
) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(e)
}

#[cfg(test)]
mod tests {
    use super::title_for;

    #[test]
    fn titles_come_from_the_locator_tail() {
        assert_eq!(title_for("/home/u/lyrics/Clarity.json"), "Clarity");
        assert_eq!(
            title_for("http://127.0.0.1:5000/get_lyrics/42/lyrics.json?x=1"),
            "lyrics"
        );
        assert_eq!(title_for("plain"), "plain");
        assert_eq!(title_for(""), "");
    }
}
