// player.rs: Media source capability and the built-in clock player

use std::time::Instant;

/// The slice of a media element the sync loop talks to. Kept to position,
/// duration and transport so any clock-bearing backend can stand in.
pub trait MediaSource {
    /// Current playback position in seconds.
    fn position(&self) -> f64;
    /// Total playable length in seconds, 0.0 when unknown.
    fn duration(&self) -> f64;
    fn paused(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
    /// Jump to `position`, clamped to the playable range.
    fn seek(&mut self, position: f64);
}

/// A media source driven purely by the monotonic clock. Holds an anchor
/// position plus the instant it was observed; while playing, the current
/// position is the anchor plus wall time elapsed since then. Pausing clears
/// the instant so paused time never leaks into estimates.
#[derive(Debug, Default)]
pub struct ClockSource {
    anchor_position: f64,
    anchor_instant: Option<Instant>,
    duration: f64,
    playing: bool,
}

impl ClockSource {
    pub fn new(duration: f64) -> Self {
        Self {
            anchor_position: 0.0,
            anchor_instant: None,
            duration: sanitize_position(duration),
            playing: false,
        }
    }

    fn clamp_to_range(&self, position: f64) -> f64 {
        let p = sanitize_position(position);
        if self.duration > 0.0 { p.min(self.duration) } else { p }
    }
}

impl MediaSource for ClockSource {
    fn position(&self) -> f64 {
        let base = self.anchor_position;
        let estimate = match (self.playing, self.anchor_instant) {
            (true, Some(instant)) => {
                let val = base + instant.elapsed().as_secs_f64();
                if val.is_finite() { val } else { base }
            }
            _ => base,
        };
        self.clamp_to_range(estimate)
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn paused(&self) -> bool {
        !self.playing
    }

    fn play(&mut self) {
        // Re-anchor at the resume moment so paused wall time is not counted.
        self.anchor_instant = Some(Instant::now());
        self.playing = true;
    }

    fn pause(&mut self) {
        let held = self.position();
        self.anchor_position = held;
        self.anchor_instant = None;
        self.playing = false;
    }

    fn seek(&mut self, position: f64) {
        self.anchor_position = self.clamp_to_range(position);
        self.anchor_instant = Some(Instant::now());
    }
}

/// Clamp a position to something usable: finite and non-negative.
pub fn sanitize_position(p: f64) -> f64 {
    if !p.is_finite() || p < 0.0 { 0.0 } else { p }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_paused_at_zero() {
        let src = ClockSource::new(180.0);
        assert!(src.paused());
        assert_eq!(src.position(), 0.0);
        assert_eq!(src.duration(), 180.0);
    }

    #[test]
    fn paused_position_is_frozen_at_seek_target() {
        let mut src = ClockSource::new(180.0);
        src.seek(42.5);
        assert!(src.paused());
        assert_eq!(src.position(), 42.5);
        assert_eq!(src.position(), 42.5);
    }

    #[test]
    fn seek_clamps_to_playable_range() {
        let mut src = ClockSource::new(100.0);
        src.seek(-5.0);
        assert_eq!(src.position(), 0.0);
        src.seek(250.0);
        assert_eq!(src.position(), 100.0);
        src.seek(f64::NAN);
        assert_eq!(src.position(), 0.0);
    }

    #[test]
    fn unknown_duration_leaves_seek_unclamped_above() {
        let mut src = ClockSource::new(0.0);
        src.seek(9999.0);
        assert_eq!(src.position(), 9999.0);
    }

    #[test]
    fn play_then_pause_holds_position() {
        let mut src = ClockSource::new(100.0);
        src.seek(10.0);
        src.play();
        assert!(!src.paused());
        src.pause();
        let held = src.position();
        assert!(held >= 10.0);
        assert_eq!(src.position(), held);
    }

    #[test]
    fn position_never_exceeds_duration() {
        let mut src = ClockSource::new(1.0);
        src.seek(1.0);
        src.play();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(src.position(), 1.0);
    }

    #[test]
    fn sanitize_rejects_non_finite_and_negative() {
        assert_eq!(sanitize_position(f64::NAN), 0.0);
        assert_eq!(sanitize_position(f64::INFINITY), 0.0);
        assert_eq!(sanitize_position(-3.0), 0.0);
        assert_eq!(sanitize_position(7.25), 7.25);
    }
}
