//! Search screen: find a song and hand its timeline to the player.
//!
//! Keystrokes edit the query; a 300ms debounce keeps suggestion requests
//! off the network while typing. Suggest and start-processing calls run on
//! their own tasks and report back over channels tagged with a generation
//! counter, so keys stay live while requests are in flight and replies
//! overtaken by further edits are discarded.

use crate::search::{SearchClient, SearchError, SearchHit};
use crate::text_utils::pad_centered;
use crate::ui::styles::LyricStyles;
use crate::ui::{Next, Tui, to_boxed_err};
use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Position, Rect};
use ratatui::text::Span;
use ratatui::widgets::{Block, Clear, List, ListItem, ListState, Paragraph};
use std::pin::Pin;
use std::time::Duration;
use textwrap::core::display_width;
use tokio::sync::mpsc;
use tokio::time::Sleep;

const DEBOUNCE: Duration = Duration::from_millis(300);
const MIN_QUERY_CHARS: usize = 2;
const HINT_LINE: &str = "type to search | \u{2191}/\u{2193} select | enter play | esc quit";

fn should_search(query: &str) -> bool {
    query.trim().chars().count() >= MIN_QUERY_CHARS
}

/// Row label for a suggestion, falling back to "title - artist" when the
/// service omits the combined form.
fn dropdown_label(hit: &SearchHit) -> String {
    if !hit.result.full_title.is_empty() {
        return hit.result.full_title.clone();
    }
    format!("{} - {}", hit.result.title, hit.result.primary_artist.name)
}

fn move_selection(list: &mut ListState, len: usize, delta: isize) {
    if len == 0 {
        list.select(None);
        return;
    }
    let current = list.selected().unwrap_or(0) as isize;
    let next = (current + delta).clamp(0, len as isize - 1) as usize;
    list.select(Some(next));
}

fn centered_box(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

struct SearchScreen {
    query: String,
    results: Vec<SearchHit>,
    list: ListState,
    alert: Option<String>,
    searching: bool,
    preparing: bool,
}

impl SearchScreen {
    fn new() -> Self {
        Self {
            query: String::new(),
            results: Vec::new(),
            list: ListState::default(),
            alert: None,
            searching: false,
            preparing: false,
        }
    }

    fn take_results(&mut self, hits: Vec<SearchHit>) {
        self.list
            .select(if hits.is_empty() { None } else { Some(0) });
        self.results = hits;
    }

    fn clear_results(&mut self) {
        self.results.clear();
        self.list.select(None);
    }

    /// Fold a start-processing reply into the screen. Returns the locator
    /// to play when the reply is current and the collaborator succeeded;
    /// outdated replies leave the screen untouched.
    fn accept_processing(
        &mut self,
        seq: u64,
        generation: u64,
        outcome: Result<String, SearchError>,
    ) -> Option<String> {
        if seq != generation {
            return None;
        }
        self.preparing = false;
        match outcome {
            Ok(locator) => Some(locator),
            Err(e) => {
                self.alert = Some(e.to_string());
                None
            }
        }
    }

    fn draw(&mut self, f: &mut Frame, styles: &LyricStyles) {
        let chunks = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(f.area());

        let input_block = Block::bordered().title(Span::styled("Search", styles.title));
        let input_inner = input_block.inner(chunks[0]);
        f.render_widget(input_block, chunks[0]);
        f.render_widget(Paragraph::new(self.query.as_str()), input_inner);
        if self.alert.is_none() {
            let cursor_x = input_inner.x
                + (display_width(&self.query) as u16).min(input_inner.width.saturating_sub(1));
            f.set_cursor_position(Position::new(cursor_x, input_inner.y));
        }

        let results_title = if self.preparing {
            "Preparing..."
        } else if self.searching {
            "Searching..."
        } else {
            "Results"
        };
        let results_block = Block::bordered().title(Span::styled(results_title, styles.title));
        let items: Vec<ListItem> = self
            .results
            .iter()
            .map(|hit| ListItem::new(dropdown_label(hit)))
            .collect();
        let list = List::new(items)
            .block(results_block)
            .highlight_style(styles.current)
            .highlight_symbol("> ");
        f.render_stateful_widget(list, chunks[1], &mut self.list);

        let hint =
            Paragraph::new(Span::styled(HINT_LINE, styles.hint)).alignment(Alignment::Center);
        f.render_widget(hint, chunks[2]);

        if let Some(message) = &self.alert {
            let modal = centered_box(f.area(), (f.area().width * 3 / 5).max(20), 6);
            let block = Block::bordered().title(Span::styled("Error", styles.alert));
            let inner = block.inner(modal);
            f.render_widget(Clear, modal);
            f.render_widget(block, modal);
            let width = inner.width.max(1) as usize;
            let mut lines: Vec<String> = textwrap::wrap(message, width)
                .into_iter()
                .map(|piece| pad_centered(&piece, width))
                .collect();
            lines.truncate(inner.height.saturating_sub(1) as usize);
            lines.push(pad_centered("press any key", width));
            let body = lines.join("\n");
            f.render_widget(Paragraph::new(body), inner);
        }
    }
}

fn redraw(
    terminal: &mut Tui,
    screen: &mut SearchScreen,
    styles: &LyricStyles,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    terminal
        .draw(|f| screen.draw(f, styles))
        .map_err(to_boxed_err)?;
    Ok(())
}

/// Run the search screen until the user picks a song or quits.
pub(crate) async fn run_search(
    terminal: &mut Tui,
    input_rx: &mut mpsc::Receiver<Event>,
    cfg: &crate::Config,
) -> Result<Next, Box<dyn std::error::Error + Send + Sync>> {
    let api_base = cfg
        .api_base
        .as_deref()
        .unwrap_or(crate::DEFAULT_API_BASE);
    let client = SearchClient::new(api_base);
    let styles = LyricStyles::default();
    let (result_tx, mut result_rx) =
        mpsc::channel::<(u64, Result<Vec<SearchHit>, SearchError>)>(4);
    let (process_tx, mut process_rx) = mpsc::channel::<(u64, Result<String, SearchError>)>(1);

    let mut screen = SearchScreen::new();
    let mut generation: u64 = 0;
    let mut debounce: Option<Pin<Box<Sleep>>> = None;
    let mut pending_title: Option<String> = None;
    redraw(terminal, &mut screen, &styles)?;

    loop {
        tokio::select! {
            biased;

            Some((seq, outcome)) = result_rx.recv() => {
                // Replies from queries the user has since edited are stale.
                if seq == generation {
                    screen.searching = false;
                    match outcome {
                        Ok(hits) => screen.take_results(hits),
                        Err(e) => {
                            screen.clear_results();
                            screen.alert = Some(e.to_string());
                        }
                    }
                    redraw(terminal, &mut screen, &styles)?;
                }
            }

            Some((seq, outcome)) = process_rx.recv() => {
                if let Some(locator) = screen.accept_processing(seq, generation, outcome) {
                    return Ok(Next::Player {
                        locator,
                        title: pending_title.take().unwrap_or_default(),
                    });
                }
                redraw(terminal, &mut screen, &styles)?;
            }

            maybe_event = input_rx.recv() => {
                let Some(event) = maybe_event else { return Ok(Next::Quit) };
                if let Event::Key(key) = event
                    && key.kind == KeyEventKind::Press
                {
                    // A visible alert blocks the screen; any key dismisses it.
                    if screen.alert.is_some() {
                        screen.alert = None;
                        redraw(terminal, &mut screen, &styles)?;
                        continue;
                    }
                    match key.code {
                        KeyCode::Esc => return Ok(Next::Quit),
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(Next::Quit);
                        }
                        KeyCode::Enter => {
                            if !screen.preparing
                                && let Some(hit) = screen
                                    .list
                                    .selected()
                                    .and_then(|i| screen.results.get(i))
                                    .cloned()
                            {
                                // The request runs on its own task; keys stay
                                // live while the collaborator prepares the song.
                                screen.preparing = true;
                                screen.searching = false;
                                debounce = None;
                                generation += 1;
                                pending_title = Some(dropdown_label(&hit));
                                let client = client.clone();
                                let seq = generation;
                                let tx = process_tx.clone();
                                tokio::spawn(async move {
                                    let outcome = client.start_processing(&hit.result).await;
                                    let _ = tx.send((seq, outcome)).await;
                                });
                            }
                        }
                        KeyCode::Up => move_selection(&mut screen.list, screen.results.len(), -1),
                        KeyCode::Down => move_selection(&mut screen.list, screen.results.len(), 1),
                        KeyCode::Backspace => {
                            screen.query.pop();
                            generation += 1;
                            screen.preparing = false;
                            pending_title = None;
                            if should_search(&screen.query) {
                                debounce = Some(Box::pin(tokio::time::sleep(DEBOUNCE)));
                            } else {
                                debounce = None;
                                screen.searching = false;
                                screen.clear_results();
                            }
                        }
                        KeyCode::Char(c) => {
                            screen.query.push(c);
                            generation += 1;
                            screen.preparing = false;
                            pending_title = None;
                            if should_search(&screen.query) {
                                debounce = Some(Box::pin(tokio::time::sleep(DEBOUNCE)));
                            } else {
                                debounce = None;
                                screen.searching = false;
                                screen.clear_results();
                            }
                        }
                        _ => {}
                    }
                }
                redraw(terminal, &mut screen, &styles)?;
            }

            // Debounce timer: fire the suggestion request
            _ = async {
                if let Some(s) = &mut debounce {
                    s.as_mut().await;
                } else {
                    futures_util::future::pending::<()>().await;
                }
            } => {
                debounce = None;
                screen.searching = true;
                let client = client.clone();
                let query = screen.query.clone();
                let seq = generation;
                let tx = result_tx.clone();
                tokio::spawn(async move {
                    let outcome = client.suggest(&query).await;
                    let _ = tx.send((seq, outcome)).await;
                });
                redraw(terminal, &mut screen, &styles)?;
            }
        }
    }
}
