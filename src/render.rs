// render.rs: Display-surface capability and the pure layout/scroll math

use crate::state::Update;
use crate::timeline::{GroupSpan, LyricUnit, Timeline};
use std::ops::Range;
use std::sync::Arc;
use textwrap::core::display_width;

/// What a display surface must be able to do. The sync loop only ever
/// rebuilds everything, moves the highlight, or asks for a unit to be
/// brought on screen, so a headless implementation is a few lines.
pub trait Renderer {
    /// Replace the rendered content wholesale.
    fn render_all(&mut self, timeline: &Arc<Timeline>, groups: &Arc<Vec<GroupSpan>>);
    /// Move the highlight to `unit`, or clear it with `None`. Implementations
    /// must be idempotent: repeating an index leaves the surface unchanged.
    fn set_highlighted(&mut self, unit: Option<usize>);
    /// Ensure the row holding `unit` is visible.
    fn scroll_into_view(&mut self, unit: usize);
}

/// Push a snapshot at a renderer. A new timeline triggers a full rebuild;
/// otherwise only an actual change of the active unit touches the surface,
/// so time updates inside one unit cost nothing.
pub fn apply_snapshot<R: Renderer>(renderer: &mut R, last: Option<&Update>, update: &Update) {
    let timeline_changed = match last {
        None => true,
        Some(prev) => !Arc::ptr_eq(&prev.timeline, &update.timeline),
    };
    if timeline_changed {
        renderer.render_all(&update.timeline, &update.groups);
    } else if last.map(|prev| prev.active) == Some(update.active) {
        return;
    }
    renderer.set_highlighted(update.active);
    if let Some(unit) = update.active {
        renderer.scroll_into_view(unit);
    }
}

/// One terminal row of lyric content.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub group: usize,
    pub content: RowContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowContent {
    /// Whole units laid side by side, space separated.
    Units(Range<usize>),
    /// A wrapped piece of one oversized unit.
    Fragment { unit: usize, text: String },
}

/// Row layout of a timeline at a given width. Rows of one group are
/// contiguous and carry its index, so scroll anchors fall out of a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPlan {
    pub rows: Vec<Row>,
}

impl RowPlan {
    pub fn build(timeline: &Timeline, groups: &[GroupSpan], width: usize) -> Self {
        let width = width.max(1);
        let mut plan = RowPlan::default();
        for (group, span) in groups.iter().enumerate() {
            let units = &timeline.units()[span.range.clone()];
            pack_group(&mut plan.rows, group, span.range.start, units, width);
        }
        plan
    }

    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Contiguous rows holding `unit`: the row it was packed into, or its
    /// run of fragment rows when it had to be wrapped.
    pub fn rows_for_unit(&self, unit: usize) -> Option<Range<usize>> {
        let mut found: Option<Range<usize>> = None;
        for (i, row) in self.rows.iter().enumerate() {
            let holds = match &row.content {
                RowContent::Units(range) => range.contains(&unit),
                RowContent::Fragment { unit: u, .. } => *u == unit,
            };
            match (&mut found, holds) {
                (None, true) => found = Some(i..i + 1),
                (Some(r), true) => r.end = i + 1,
                (Some(_), false) => break,
                (None, false) => {}
            }
        }
        found
    }
}

/// Greedy-pack a group's units into rows no wider than `width`. A unit too
/// wide even for a row of its own is wrapped into fragments instead.
fn pack_group(rows: &mut Vec<Row>, group: usize, base: usize, units: &[LyricUnit], width: usize) {
    let mut row_start = 0usize;
    let mut row_width = 0usize;
    let mut flush = |rows: &mut Vec<Row>, start: usize, end: usize| {
        if start == end {
            return;
        }
        let lone = end - start == 1;
        let unit_idx = base + start;
        if lone && display_width(&units[start].text) > width {
            for piece in textwrap::wrap(&units[start].text, width) {
                rows.push(Row {
                    group,
                    content: RowContent::Fragment {
                        unit: unit_idx,
                        text: piece.into_owned(),
                    },
                });
            }
        } else {
            rows.push(Row {
                group,
                content: RowContent::Units(base + start..base + end),
            });
        }
    };
    for (i, unit) in units.iter().enumerate() {
        let w = display_width(&unit.text);
        let needed = if row_width == 0 { w } else { row_width + 1 + w };
        if row_width > 0 && needed > width {
            flush(rows, row_start, i);
            row_start = i;
            row_width = w;
        } else {
            row_width = needed;
        }
    }
    flush(rows, row_start, units.len());
}

/// Scroll state of the lyrics viewport, in rows. Mirrors a scrollable box:
/// revealing a row that is already fully visible does nothing, anything
/// else glides the viewport until the row's top sits mid-screen.
#[derive(Debug, Clone, Default)]
pub struct ScrollView {
    top: f64,
    target: Option<f64>,
    viewport: usize,
    content: usize,
}

impl ScrollView {
    const EASING: f64 = 0.35;
    const SETTLE: f64 = 0.45;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_bounds(&mut self, viewport: usize, content: usize) {
        self.viewport = viewport;
        self.content = content;
        let max = self.max_top();
        if self.top > max {
            self.top = max;
        }
        if let Some(t) = self.target {
            self.target = Some(t.clamp(0.0, max));
        }
    }

    fn max_top(&self) -> f64 {
        self.content.saturating_sub(self.viewport) as f64
    }

    /// Offset actually applied to the surface this frame.
    pub fn top_offset(&self) -> usize {
        self.top.round().max(0.0) as usize
    }

    pub fn is_visible(&self, row_top: usize, row_height: usize) -> bool {
        let top = self.top_offset();
        row_top >= top && row_top + row_height <= top + self.viewport
    }

    /// Request that a row be brought on screen. Fully visible rows are left
    /// alone; otherwise the viewport eases until the row's top is centered.
    pub fn reveal(&mut self, row_top: usize, row_height: usize) {
        if self.is_visible(row_top, row_height) {
            return;
        }
        let centered = row_top as f64 - self.viewport as f64 / 2.0;
        let target = centered.clamp(0.0, self.max_top());
        if (target - self.top).abs() < Self::SETTLE {
            self.top = target;
            self.target = None;
        } else {
            self.target = Some(target);
        }
    }

    /// Advance the glide by one frame. Returns true while still moving.
    pub fn step(&mut self) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        self.top += (target - self.top) * Self::EASING;
        if (target - self.top).abs() < Self::SETTLE {
            self.top = target;
            self.target = None;
            return false;
        }
        true
    }

    pub fn is_animating(&self) -> bool {
        self.target.is_some()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRenderer;
    use super::*;
    use crate::state::SyncEngine;
    use crate::timeline::GroupingStrategy;

    fn word(text: &str, start: f64, end: f64) -> LyricUnit {
        LyricUnit::new(text, start, end)
    }

    fn plan_for(units: Vec<LyricUnit>, threshold: f64, width: usize) -> (Timeline, RowPlan) {
        let timeline = Timeline::new(units);
        let groups = timeline.group_spans(GroupingStrategy::ByGap { threshold });
        let plan = RowPlan::build(&timeline, &groups, width);
        (timeline, plan)
    }

    #[test]
    fn short_group_fits_on_one_row() {
        let (_, plan) = plan_for(
            vec![word("never", 0.0, 0.2), word("gonna", 0.3, 0.5)],
            1.0,
            40,
        );
        assert_eq!(plan.total_rows(), 1);
        assert_eq!(plan.rows[0].content, RowContent::Units(0..2));
        assert_eq!(plan.rows_for_unit(1), Some(0..1));
    }

    #[test]
    fn wide_group_wraps_at_word_boundaries() {
        let (_, plan) = plan_for(
            vec![
                word("aaaa", 0.0, 0.1),
                word("bbbb", 0.2, 0.3),
                word("cccc", 0.4, 0.5),
            ],
            1.0,
            9, // fits "aaaa bbbb" but not "aaaa bbbb cccc"
        );
        assert_eq!(plan.total_rows(), 2);
        assert_eq!(plan.rows[0].content, RowContent::Units(0..2));
        assert_eq!(plan.rows[1].content, RowContent::Units(2..3));
        assert_eq!(plan.rows_for_unit(2), Some(1..2));
    }

    #[test]
    fn oversized_lone_unit_becomes_fragments() {
        let (_, plan) = plan_for(vec![word("incomprehensibilities", 0.0, 1.0)], 1.0, 8);
        assert!(plan.total_rows() > 1);
        for row in &plan.rows {
            match &row.content {
                RowContent::Fragment { unit, text } => {
                    assert_eq!(*unit, 0);
                    assert!(display_width(text) <= 8);
                }
                other => panic!("expected fragments, got {other:?}"),
            }
        }
        // All fragment rows belong to the one unit.
        assert_eq!(plan.rows_for_unit(0), Some(0..plan.total_rows()));
    }

    #[test]
    fn separated_groups_get_separate_rows() {
        let (_, plan) = plan_for(
            vec![word("one", 0.0, 0.2), word("two", 3.0, 3.2)],
            1.0,
            40,
        );
        assert_eq!(plan.total_rows(), 2);
        assert_eq!(plan.rows[0].group, 0);
        assert_eq!(plan.rows[1].group, 1);
        assert_eq!(plan.rows_for_unit(1), Some(1..2));
        assert_eq!(plan.rows_for_unit(9), None);
    }

    #[test]
    fn empty_timeline_plans_zero_rows() {
        let (_, plan) = plan_for(Vec::new(), 1.0, 40);
        assert_eq!(plan.total_rows(), 0);
        assert_eq!(plan.rows_for_unit(0), None);
    }

    #[test]
    fn visible_row_is_not_scrolled_to() {
        let mut view = ScrollView::new();
        view.set_bounds(10, 100);
        view.reveal(3, 1);
        assert!(!view.is_animating());
        assert_eq!(view.top_offset(), 0);
    }

    #[test]
    fn offscreen_row_centers_with_clamping() {
        let mut view = ScrollView::new();
        view.set_bounds(10, 100);

        view.reveal(50, 1);
        while view.step() {}
        assert_eq!(view.top_offset(), 45); // 50 - 10/2

        // Near the end the target clamps to the last full viewport.
        view.reveal(99, 1);
        while view.step() {}
        assert_eq!(view.top_offset(), 90);

        // Near the top it clamps to zero.
        view.reveal(1, 1);
        while view.step() {}
        assert_eq!(view.top_offset(), 0);
    }

    #[test]
    fn glide_converges_in_bounded_frames() {
        let mut view = ScrollView::new();
        view.set_bounds(10, 200);
        view.reveal(150, 1);
        let mut frames = 0;
        while view.step() {
            frames += 1;
            assert!(frames < 60, "glide should settle quickly");
        }
        assert_eq!(view.top_offset(), 145);
        assert!(!view.is_animating());
    }

    #[test]
    fn shrinking_content_clamps_the_offset() {
        let mut view = ScrollView::new();
        view.set_bounds(10, 100);
        view.reveal(80, 1);
        while view.step() {}
        view.set_bounds(10, 20);
        assert_eq!(view.top_offset(), 10);
    }

    fn snapshots() -> (Update, Update, Update) {
        let mut engine = SyncEngine::new();
        engine.install_timeline(
            Timeline::new(vec![word("Hello", 0.0, 1.0), word("World", 1.5, 2.5)]),
            GroupingStrategy::ByGap { threshold: 1.0 },
            None,
        );
        engine.sync_to(true, 0.5);
        let first = engine.snapshot();
        engine.sync_to(true, 0.9);
        let same_active = engine.snapshot();
        engine.sync_to(true, 2.0);
        let moved = engine.snapshot();
        (first, same_active, moved)
    }

    #[test]
    fn snapshot_application_renders_once_per_timeline() {
        let (first, same_active, moved) = snapshots();
        let mut renderer = RecordingRenderer::default();

        apply_snapshot(&mut renderer, None, &first);
        assert_eq!(renderer.rendered_unit_counts, vec![2]);
        assert_eq!(renderer.highlight_calls, vec![Some(0)]);
        assert_eq!(renderer.scroll_calls, vec![0]);

        // Position moved inside the same unit: surface untouched.
        apply_snapshot(&mut renderer, Some(&first), &same_active);
        assert_eq!(renderer.rendered_unit_counts.len(), 1);
        assert_eq!(renderer.highlight_calls.len(), 1);

        // Active unit moved: one highlight call, one scroll request.
        apply_snapshot(&mut renderer, Some(&same_active), &moved);
        assert_eq!(renderer.highlight_calls, vec![Some(0), Some(1)]);
        assert_eq!(renderer.scroll_calls, vec![0, 1]);
        assert_eq!(renderer.rendered_unit_counts.len(), 1);
    }

    #[test]
    fn clearing_the_highlight_does_not_scroll() {
        let (first, ..) = snapshots();
        let mut renderer = RecordingRenderer::default();
        apply_snapshot(&mut renderer, None, &first);

        let mut gap = first.clone();
        gap.active = None;
        gap.position = 1.2;
        gap.version += 1;
        apply_snapshot(&mut renderer, Some(&first), &gap);
        assert_eq!(renderer.highlighted, None);
        assert_eq!(renderer.scroll_calls, vec![0]);
    }

    #[test]
    fn repeating_an_index_leaves_the_double_unchanged() {
        let mut renderer = RecordingRenderer::default();
        renderer.set_highlighted(Some(1));
        let after_first = renderer.highlighted;
        renderer.set_highlighted(Some(1));
        assert_eq!(renderer.highlighted, after_first);
    }
}
