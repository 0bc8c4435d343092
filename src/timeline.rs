// timeline.rs: Timed lyric units and position-to-unit resolution

use std::ops::Range;

/// One displayable fragment with its active time span in seconds.
///
/// A unit is a word for word-level payloads or a whole line for line-level
/// ones. `start` and `end` are both inclusive: a unit is active for every
/// position `t` with `start <= t <= end`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricUnit {
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Grouping id carried by the payload, when it has one. Units sharing
    /// consecutive equal ids render as one visual row.
    pub group: Option<u32>,
}

impl LyricUnit {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            group: None,
        }
    }

    /// Fraction of this unit's span elapsed at `position`, clamped to 0..=1.
    /// Zero-length spans count as fully elapsed once reached.
    pub fn progress(&self, position: f64) -> f64 {
        let len = self.end - self.start;
        if len <= 0.0 {
            return if position >= self.start { 1.0 } else { 0.0 };
        }
        ((position - self.start) / len).clamp(0.0, 1.0)
    }
}

/// How units are folded into visual rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupingStrategy {
    /// Respect the payload's grouping ids; units without an id stand alone.
    Explicit,
    /// Start a new row wherever the silence between adjacent units exceeds
    /// `threshold` seconds. Used for word payloads that carry no ids.
    ByGap { threshold: f64 },
}

/// A run of consecutive units rendered as one row.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpan {
    pub range: Range<usize>,
}

impl GroupSpan {
    pub fn contains(&self, unit: usize) -> bool {
        self.range.contains(&unit)
    }
}

/// Find the span holding `unit`. Spans are contiguous and ordered, so a
/// binary search over range starts is enough.
pub fn span_containing(spans: &[GroupSpan], unit: usize) -> Option<usize> {
    let idx = spans.partition_point(|s| s.range.start <= unit);
    if idx == 0 {
        return None;
    }
    let candidate = idx - 1;
    spans[candidate].contains(unit).then_some(candidate)
}

/// Immutable index over the units of one song, ordered by start time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    units: Vec<LyricUnit>,
    /// True when any unit begins at or before the previous one ends. With
    /// inclusive ends even a shared boundary instant makes two units match
    /// at once, so the sorted fast path cannot be trusted to pick the
    /// earliest of them.
    overlapping: bool,
}

impl Timeline {
    pub fn new(mut units: Vec<LyricUnit>) -> Self {
        units.sort_by(|a, b| a.start.total_cmp(&b.start));
        let overlapping = units.windows(2).any(|w| w[1].start <= w[0].end);
        Self { units, overlapping }
    }

    pub fn units(&self) -> &[LyricUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Text of a whole group, units joined by single spaces.
    pub fn group_text(&self, span: &GroupSpan) -> String {
        self.units[span.range.clone()]
            .iter()
            .map(|u| u.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Largest end time of any unit, or 0.0 for an empty timeline. Serves as
    /// the playable length when the media source cannot report one.
    pub fn duration_hint(&self) -> f64 {
        self.units
            .iter()
            .map(|u| u.end)
            .fold(0.0, |acc, end| if end > acc { end } else { acc })
    }

    /// Index of the unit active at `position`, or `None` when the position
    /// falls in a gap between spans (or outside the song entirely).
    ///
    /// When several units contain the same instant the earliest one wins,
    /// so a full scan is the reference behavior. Cleanly separated
    /// timelines take a binary search over the sorted starts instead; the
    /// two paths agree exactly on such input.
    pub fn resolve(&self, position: f64) -> Option<usize> {
        if self.overlapping {
            self.resolve_scan(position)
        } else {
            self.resolve_sorted(position)
        }
    }

    fn resolve_scan(&self, position: f64) -> Option<usize> {
        self.units
            .iter()
            .position(|u| position >= u.start && position <= u.end)
    }

    fn resolve_sorted(&self, position: f64) -> Option<usize> {
        // First unit starting after `position`; the only candidate container
        // is the one just before it.
        let idx = self.units.partition_point(|u| u.start <= position);
        if idx == 0 {
            return None;
        }
        let candidate = idx - 1;
        (position <= self.units[candidate].end).then_some(candidate)
    }

    /// Fold units into visual rows according to `strategy`.
    pub fn group_spans(&self, strategy: GroupingStrategy) -> Vec<GroupSpan> {
        let mut spans: Vec<GroupSpan> = Vec::new();
        for (idx, unit) in self.units.iter().enumerate() {
            let extend = match (&strategy, spans.last(), idx.checked_sub(1)) {
                (GroupingStrategy::Explicit, Some(_), Some(prev)) => {
                    let prev_group = self.units[prev].group;
                    unit.group.is_some() && unit.group == prev_group
                }
                (GroupingStrategy::ByGap { threshold }, Some(_), Some(prev)) => {
                    unit.start - self.units[prev].end <= *threshold
                }
                _ => false,
            };
            if extend {
                if let Some(last) = spans.last_mut() {
                    last.range.end = idx + 1;
                }
            } else {
                spans.push(GroupSpan {
                    range: idx..idx + 1,
                });
            }
        }
        spans
    }
}
