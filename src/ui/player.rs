//! Full-screen player: synchronized lyric display with transport controls.
//!
//! The event loop uses `tokio::select!` to handle:
//! - State snapshots from the playback engine
//! - User keyboard input (transport, karaoke/fullscreen toggles, q/ESC to quit)
//! - Frame timer wakeups while a scroll glide is in flight

use crate::engine::{self, Command};
use crate::player::ClockSource;
use crate::render::{Renderer, Row, RowContent, RowPlan, ScrollView, apply_snapshot};
use crate::state::Update;
use crate::text_utils::time_label;
use crate::timeline::{GroupSpan, Timeline, span_containing};
use crate::ui::styles::LyricStyles;
use crate::ui::{Next, Tui, engine_options, to_boxed_err};
use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Gauge, Paragraph, Wrap};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Sleep;
use unicode_segmentation::UnicodeSegmentation;

const FRAME_INTERVAL: Duration = Duration::from_millis(30);
const SEEK_STEP_SECS: f64 = 5.0;
const HINT_LINE: &str = "space play/pause | r restart | \u{2190}/\u{2192} seek | k karaoke | f full | s search | q quit";

/// View state for the player screen. Implements [`Renderer`] so engine
/// snapshots reach it through the same surface a headless sink uses.
pub struct TimelineView {
    timeline: Arc<Timeline>,
    groups: Arc<Vec<GroupSpan>>,
    plan: RowPlan,
    /// Width the plan was built for; zero until the first layout.
    plan_width: usize,
    scroll: ScrollView,
    active: Option<usize>,
    pending_reveal: Option<usize>,
    karaoke: bool,
    fullscreen: bool,
    title: String,
}

impl TimelineView {
    pub fn new(title: String, karaoke: bool) -> Self {
        Self {
            timeline: Arc::new(Timeline::default()),
            groups: Arc::new(Vec::new()),
            plan: RowPlan::default(),
            plan_width: 0,
            scroll: ScrollView::new(),
            active: None,
            pending_reveal: None,
            karaoke,
            fullscreen: false,
            title,
        }
    }

    fn active_group(&self) -> Option<usize> {
        self.active
            .and_then(|unit| span_containing(&self.groups, unit))
    }

    /// Rebuild the row plan when the width changed, refresh the scroll
    /// bounds, and satisfy any reveal request now that rows have positions.
    fn sync_layout(&mut self, width: u16, height: u16) {
        let width = width.max(1) as usize;
        if self.plan_width != width {
            self.plan = RowPlan::build(&self.timeline, &self.groups, width);
            self.plan_width = width;
            // Keep the active row on screen across a resize.
            if self.pending_reveal.is_none() {
                self.pending_reveal = self.active;
            }
        }
        self.scroll.set_bounds(height as usize, self.plan.total_rows());
        if let Some(unit) = self.pending_reveal.take()
            && let Some(rows) = self.plan.rows_for_unit(unit)
        {
            self.scroll.reveal(rows.start, rows.len());
        }
    }

    fn tick_scroll(&mut self) {
        self.scroll.step();
    }

    fn build_lines(&self, position: f64, styles: &LyricStyles) -> Vec<Line<'static>> {
        let active_group = self.active_group();
        self.plan
            .rows
            .iter()
            .map(|row| self.row_line(row, position, active_group, styles))
            .collect()
    }

    fn row_line(
        &self,
        row: &Row,
        position: f64,
        active_group: Option<usize>,
        styles: &LyricStyles,
    ) -> Line<'static> {
        let relation = active_group.map(|g| row.group.cmp(&g));
        match &row.content {
            RowContent::Fragment { text, .. } => {
                let style = match relation {
                    Some(std::cmp::Ordering::Less) => styles.before,
                    Some(std::cmp::Ordering::Equal) => styles.current,
                    _ => styles.after,
                };
                Line::from(Span::styled(text.clone(), style))
            }
            RowContent::Units(range) => {
                let units = &self.timeline.units()[range.clone()];
                match relation {
                    Some(std::cmp::Ordering::Equal) if self.karaoke => {
                        karaoke_line(units, position, styles)
                    }
                    Some(std::cmp::Ordering::Equal) => Line::from(Span::styled(
                        joined_text(units),
                        styles.current,
                    )),
                    Some(std::cmp::Ordering::Less) => {
                        Line::from(Span::styled(joined_text(units), styles.before))
                    }
                    _ => Line::from(Span::styled(joined_text(units), styles.after)),
                }
            }
        }
    }
}

impl Renderer for TimelineView {
    fn render_all(&mut self, timeline: &Arc<Timeline>, groups: &Arc<Vec<GroupSpan>>) {
        self.timeline = Arc::clone(timeline);
        self.groups = Arc::clone(groups);
        self.plan = RowPlan::default();
        self.plan_width = 0;
        self.scroll = ScrollView::new();
        self.active = None;
        self.pending_reveal = None;
    }

    fn set_highlighted(&mut self, unit: Option<usize>) {
        self.active = unit;
    }

    fn scroll_into_view(&mut self, unit: usize) {
        self.pending_reveal = Some(unit);
    }
}

fn joined_text(units: &[crate::timeline::LyricUnit]) -> String {
    units
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Per-unit karaoke styling for the active row: sung units in the current
/// style, upcoming ones plain, and the in-flight unit split at a grapheme
/// boundary by its elapsed fraction.
fn karaoke_line(
    units: &[crate::timeline::LyricUnit],
    position: f64,
    styles: &LyricStyles,
) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, unit) in units.iter().enumerate() {
        let last = i + 1 == units.len();
        let sep = if last { "" } else { " " };
        if position >= unit.end {
            spans.push(Span::styled(format!("{}{}", unit.text, sep), styles.current));
            continue;
        }
        if position < unit.start {
            spans.push(Span::styled(format!("{}{}", unit.text, sep), styles.after));
            continue;
        }
        let graphemes: Vec<&str> = unit.text.graphemes(true).collect();
        let total = graphemes.len();
        let filled = ((unit.progress(position) * total as f64).floor() as usize).min(total);
        if filled == 0 {
            spans.push(Span::styled(format!("{}{}", unit.text, sep), styles.after));
        } else if filled >= total {
            spans.push(Span::styled(format!("{}{}", unit.text, sep), styles.current));
        } else {
            let split: usize = graphemes[..filled].iter().map(|g| g.len()).sum();
            spans.push(Span::styled(unit.text[..split].to_string(), styles.current));
            spans.push(Span::styled(
                format!("{}{}", &unit.text[split..], sep),
                styles.after,
            ));
        }
    }
    Line::from(spans)
}

fn transport_label(update: Option<&Update>) -> (f64, String) {
    let (position, duration, playing) = update
        .map(|u| (u.position, u.duration, u.playing))
        .unwrap_or((0.0, 0.0, false));
    let ratio = if duration > 0.0 && position.is_finite() {
        (position / duration).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut label = time_label(position, duration);
    if !playing {
        label.push_str("  paused");
    }
    (ratio, label)
}

fn draw(f: &mut Frame, view: &mut TimelineView, update: Option<&Update>, styles: &LyricStyles) {
    let area = f.area();
    let chrome = if view.fullscreen {
        None
    } else {
        let chunks = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);
        Some((chunks[0], chunks[1], chunks[2]))
    };

    let lyrics_area = match chrome {
        Some((outer, _, _)) => {
            let block =
                Block::bordered().title(Span::styled(view.title.clone(), styles.title));
            let inner = block.inner(outer);
            f.render_widget(block, outer);
            inner
        }
        None => area,
    };

    view.sync_layout(lyrics_area.width, lyrics_area.height);

    let position = update.map(|u| u.position).unwrap_or(0.0);
    if let Some(err) = update.and_then(|u| u.err.as_deref()) {
        let msg = Paragraph::new(Span::styled(err.to_string(), styles.alert))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(msg, lower_half(lyrics_area));
    } else if view.timeline.is_empty() {
        let placeholder = Paragraph::new(Span::styled("No lyrics", styles.hint))
            .alignment(Alignment::Center);
        f.render_widget(placeholder, lower_half(lyrics_area));
    } else {
        let paragraph = Paragraph::new(view.build_lines(position, styles))
            .alignment(Alignment::Center)
            .scroll((view.scroll.top_offset() as u16, 0));
        f.render_widget(paragraph, lyrics_area);
    }

    if let Some((_, gauge_area, hint_area)) = chrome {
        let (ratio, label) = transport_label(update);
        let gauge = Gauge::default()
            .gauge_style(styles.gauge)
            .ratio(ratio)
            .label(label);
        f.render_widget(gauge, gauge_area);
        let hint =
            Paragraph::new(Span::styled(HINT_LINE, styles.hint)).alignment(Alignment::Center);
        f.render_widget(hint, hint_area);
    }
}

fn lower_half(area: Rect) -> Rect {
    let offset = area.height / 2;
    Rect {
        x: area.x,
        y: area.y + offset,
        width: area.width,
        height: area.height - offset,
    }
}

enum Outcome {
    Continue,
    Leave(Next),
}

async fn process_event(
    event: Event,
    view: &mut TimelineView,
    cmd_tx: &mpsc::Sender<Command>,
) -> Outcome {
    if let Event::Key(key) = event
        && key.kind == KeyEventKind::Press
    {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Outcome::Leave(Next::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Outcome::Leave(Next::Quit);
            }
            KeyCode::Char('s') => return Outcome::Leave(Next::Search),
            KeyCode::Char(' ') | KeyCode::Char('p') => {
                let _ = cmd_tx.send(Command::TogglePlay).await;
            }
            KeyCode::Char('r') => {
                let _ = cmd_tx.send(Command::Restart).await;
            }
            KeyCode::Left => {
                let _ = cmd_tx.send(Command::SeekBy(-SEEK_STEP_SECS)).await;
            }
            KeyCode::Right => {
                let _ = cmd_tx.send(Command::SeekBy(SEEK_STEP_SECS)).await;
            }
            KeyCode::Char('k') => view.karaoke = !view.karaoke,
            KeyCode::Char('f') => view.fullscreen = !view.fullscreen,
            _ => {}
        }
    }
    Outcome::Continue
}

/// Arm the frame timer when a glide is in flight, clear it once settled.
/// An armed frame keeps its deadline: snapshots can arrive faster than
/// frames, and a fresh sleep per redraw would recede and never fire.
fn schedule_frame(scroll: &ScrollView, frame_sleep: &mut Option<Pin<Box<Sleep>>>) {
    if !scroll.is_animating() {
        *frame_sleep = None;
    } else if frame_sleep.is_none() {
        *frame_sleep = Some(Box::pin(tokio::time::sleep(FRAME_INTERVAL)));
    }
}

fn redraw(
    terminal: &mut Tui,
    view: &mut TimelineView,
    update: Option<&Update>,
    styles: &LyricStyles,
    frame_sleep: &mut Option<Pin<Box<Sleep>>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    terminal
        .draw(|f| draw(f, view, update, styles))
        .map_err(to_boxed_err)?;
    schedule_frame(&view.scroll, frame_sleep);
    Ok(())
}

/// Run the player screen for one lyrics source. Returns where to go next.
pub(crate) async fn run_player(
    terminal: &mut Tui,
    input_rx: &mut mpsc::Receiver<Event>,
    cfg: &crate::Config,
    locator: String,
    title: String,
) -> Result<Next, Box<dyn std::error::Error + Send + Sync>> {
    let (update_tx, mut update_rx) = mpsc::channel(32);
    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let source = ClockSource::new(cfg.duration.unwrap_or(0.0));
    tokio::spawn(engine::run(
        source,
        locator,
        engine_options(cfg),
        update_tx,
        cmd_rx,
    ));

    let styles = LyricStyles::default();
    let mut view = TimelineView::new(title, !cfg.no_karaoke);
    let mut last: Option<Update> = None;
    let mut frame_sleep: Option<Pin<Box<Sleep>>> = None;
    redraw(terminal, &mut view, None, &styles, &mut frame_sleep)?;

    loop {
        tokio::select! {
            biased;

            update = update_rx.recv() => {
                // Engine gone; fall back to the search screen.
                let Some(update) = update else { return Ok(Next::Search) };
                apply_snapshot(&mut view, last.as_ref(), &update);
                last = Some(update);
                redraw(terminal, &mut view, last.as_ref(), &styles, &mut frame_sleep)?;
            }

            maybe_event = input_rx.recv() => {
                let Some(event) = maybe_event else { return Ok(Next::Quit) };
                match process_event(event, &mut view, &cmd_tx).await {
                    Outcome::Leave(next) => return Ok(next),
                    Outcome::Continue => {
                        redraw(terminal, &mut view, last.as_ref(), &styles, &mut frame_sleep)?;
                    }
                }
            }

            // Frame timer for scroll glides
            _ = async {
                if let Some(s) = &mut frame_sleep {
                    s.as_mut().await;
                } else {
                    futures_util::future::pending::<()>().await;
                }
            } => {
                frame_sleep = None;
                view.tick_scroll();
                redraw(terminal, &mut view, last.as_ref(), &styles, &mut frame_sleep)?;
            }
        }
    }
}
