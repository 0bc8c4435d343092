use crate::engine;
use crate::player::ClockSource;
use crate::render::{Renderer, apply_snapshot};
use crate::state::Update;
use crate::timeline::{GroupSpan, Timeline, span_containing};
use crate::ui::engine_options;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Renderer that writes the active group's text, one line per change.
/// Re-entering a group after a gap prints it again.
struct LinePrinter<W: Write> {
    timeline: Arc<Timeline>,
    groups: Arc<Vec<GroupSpan>>,
    last_group: Option<usize>,
    out: W,
}

impl<W: Write> LinePrinter<W> {
    fn new(out: W) -> Self {
        Self {
            timeline: Arc::new(Timeline::default()),
            groups: Arc::new(Vec::new()),
            last_group: None,
            out,
        }
    }
}

impl<W: Write> Renderer for LinePrinter<W> {
    fn render_all(&mut self, timeline: &Arc<Timeline>, groups: &Arc<Vec<GroupSpan>>) {
        self.timeline = Arc::clone(timeline);
        self.groups = Arc::clone(groups);
        self.last_group = None;
    }

    fn set_highlighted(&mut self, unit: Option<usize>) {
        let group = unit.and_then(|u| span_containing(&self.groups, u));
        if group == self.last_group {
            return;
        }
        if let Some(g) = group
            && let Some(span) = self.groups.get(g)
        {
            let _ = writeln!(self.out, "{}", self.timeline.group_text(span));
            let _ = self.out.flush();
        }
        self.last_group = group;
    }

    fn scroll_into_view(&mut self, _unit: usize) {}
}

/// Display lyrics in pipe mode (stdout only, for scripting). Playback
/// starts immediately and the task ends when the song does.
pub async fn run_pipe(
    cfg: &crate::Config,
    locator: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (update_tx, mut update_rx) = mpsc::channel(32);
    let (_cmd_tx, cmd_rx) = mpsc::channel(8);
    let mut opts = engine_options(cfg);
    opts.autoplay = true;
    let source = ClockSource::new(cfg.duration.unwrap_or(0.0));
    tokio::spawn(engine::run(source, locator, opts, update_tx, cmd_rx));

    let mut printer = LinePrinter::new(std::io::stdout());
    let mut last: Option<Update> = None;
    while let Some(update) = update_rx.recv().await {
        if update.timeline.is_empty() {
            return match update.err {
                Some(err) => Err(err.into()),
                None => Ok(()),
            };
        }
        apply_snapshot(&mut printer, last.as_ref(), &update);
        let finished =
            !update.playing && update.duration > 0.0 && update.position >= update.duration;
        last = Some(update);
        if finished {
            break;
        }
    }
    Ok(())
}
