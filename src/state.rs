// state.rs: Playback snapshot and the position-to-highlight sync core

use crate::timeline::{GroupSpan, GroupingStrategy, Timeline};
use std::sync::Arc;

/// Snapshot of player and highlight state handed to a display surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub timeline: Arc<Timeline>,
    pub groups: Arc<Vec<GroupSpan>>,
    /// Index of the active unit, `None` while in a gap.
    pub active: Option<usize>,
    pub position: f64,
    pub duration: f64,
    pub playing: bool,
    pub err: Option<String>,
    pub version: u64, // Incremented on any state change
}

/// Transport and highlight state of the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub position: f64,
    pub duration: f64,
    pub playing: bool,
    pub active: Option<usize>,
    pub err: Option<String>,
}

/// Owns the timeline plus playback state and keeps the active unit in step
/// with the reported position. Every observable change bumps `version` so
/// consumers can skip redundant snapshots.
pub struct SyncEngine {
    timeline: Arc<Timeline>,
    groups: Arc<Vec<GroupSpan>>,
    pub playback: PlaybackState,
    version: u64,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self {
            timeline: Arc::new(Timeline::default()),
            groups: Arc::new(Vec::new()),
            playback: PlaybackState::default(),
            version: 0,
        }
    }

    pub fn timeline(&self) -> &Arc<Timeline> {
        &self.timeline
    }

    /// Replace the timeline wholesale. The active unit is dropped and left
    /// for the next `sync_to` call to re-resolve against the new units.
    pub fn install_timeline(
        &mut self,
        timeline: Timeline,
        grouping: GroupingStrategy,
        err: Option<String>,
    ) {
        let groups = timeline.group_spans(grouping);
        self.timeline = Arc::new(timeline);
        self.groups = Arc::new(groups);
        self.playback.active = None;
        self.playback.err = err;
        self.version += 1;
    }

    pub fn set_duration(&mut self, duration: f64) {
        if (self.playback.duration - duration).abs() > f64::EPSILON {
            self.playback.duration = duration;
            self.version += 1;
        }
    }

    /// Fold a fresh transport reading into the state and re-resolve the
    /// active unit. Returns true when anything observable changed; the
    /// active index only moves when resolution actually lands elsewhere, so
    /// a position crawling inside one unit never churns the highlight.
    pub fn sync_to(&mut self, playing: bool, position: f64) -> bool {
        let before = self.version;
        if self.playback.playing != playing
            || (self.playback.position - position).abs() > f64::EPSILON
        {
            self.version += 1;
        }
        self.playback.playing = playing;
        self.playback.position = position;
        let resolved = self.timeline.resolve(position);
        if resolved != self.playback.active {
            self.playback.active = resolved;
            self.version += 1;
        }
        self.version != before
    }

    /// Jump back to the start: position zero, no active unit. Resolution at
    /// the new position happens on the next `sync_to`, so a unit whose span
    /// covers zero lights up again as a fresh change.
    pub fn rewind(&mut self) {
        self.playback.position = 0.0;
        self.playback.active = None;
        self.version += 1;
    }

    pub fn snapshot(&self) -> Update {
        Update {
            timeline: Arc::clone(&self.timeline),
            groups: Arc::clone(&self.groups),
            active: self.playback.active,
            position: self.playback.position,
            duration: self.playback.duration,
            playing: self.playback.playing,
            err: self.playback.err.clone(),
            version: self.version,
        }
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::LyricUnit;

    fn engine_with(units: Vec<LyricUnit>) -> SyncEngine {
        let mut engine = SyncEngine::new();
        engine.install_timeline(
            Timeline::new(units),
            GroupingStrategy::ByGap { threshold: 1.0 },
            None,
        );
        engine
    }

    fn two_units() -> SyncEngine {
        engine_with(vec![
            LyricUnit::new("Hello", 0.0, 1.0),
            LyricUnit::new("World", 1.5, 2.5),
        ])
    }

    #[test]
    fn sync_follows_position_through_spans_and_gaps() {
        let mut engine = two_units();
        engine.sync_to(true, 0.5);
        assert_eq!(engine.playback.active, Some(0));
        engine.sync_to(true, 1.2);
        assert_eq!(engine.playback.active, None);
        engine.sync_to(true, 2.0);
        assert_eq!(engine.playback.active, Some(1));
    }

    #[test]
    fn repeated_sync_at_same_position_changes_nothing() {
        let mut engine = two_units();
        assert!(engine.sync_to(true, 0.5));
        let version = engine.snapshot().version;
        assert!(!engine.sync_to(true, 0.5));
        assert_eq!(engine.snapshot().version, version);
    }

    #[test]
    fn moving_within_one_unit_keeps_active_stable() {
        let mut engine = two_units();
        engine.sync_to(true, 0.1);
        let active = engine.playback.active;
        assert!(engine.sync_to(true, 0.9), "position change is observable");
        assert_eq!(engine.playback.active, active);
    }

    #[test]
    fn rewind_clears_active_then_resync_relights_it() {
        let mut engine = two_units();
        engine.sync_to(true, 2.0);
        assert_eq!(engine.playback.active, Some(1));
        engine.rewind();
        assert_eq!(engine.playback.active, None);
        assert_eq!(engine.playback.position, 0.0);
        // Unit 0 spans t=0, so the next reading brings it back.
        engine.sync_to(true, 0.0);
        assert_eq!(engine.playback.active, Some(0));
    }

    #[test]
    fn install_resets_active_and_records_error() {
        let mut engine = two_units();
        engine.sync_to(true, 0.5);
        engine.install_timeline(
            Timeline::default(),
            GroupingStrategy::Explicit,
            Some("fetch failed".into()),
        );
        let snap = engine.snapshot();
        assert_eq!(snap.active, None);
        assert!(snap.timeline.is_empty());
        assert_eq!(snap.err.as_deref(), Some("fetch failed"));
    }

    #[test]
    fn empty_timeline_never_resolves() {
        let mut engine = SyncEngine::new();
        assert!(!engine.sync_to(false, 0.0));
        engine.sync_to(true, 5.0);
        assert_eq!(engine.playback.active, None);
    }

    #[test]
    fn snapshot_carries_groups() {
        let engine = engine_with(vec![
            LyricUnit::new("a", 0.0, 0.4),
            LyricUnit::new("b", 0.5, 0.9),
            LyricUnit::new("c", 3.0, 3.4),
        ]);
        let snap = engine.snapshot();
        assert_eq!(snap.groups.len(), 2);
        assert_eq!(snap.groups[0].range, 0..2);
    }
}
