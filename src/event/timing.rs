// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Frame accounting for a single note.
//!
//! All counters are unsigned. Frames left are always derived from the
//! counters, never stored.

/// A count of frames.
pub type Frames = u64;

/// The playable-timing facet of a note.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameClock {
    /// Frames per render period.
    period: Frames,
    /// Start of the note within the current period. Counts down while the
    /// note waits for a later period.
    offset: Frames,
    frames: Frames,
    orig_frames: Frames,
    orig_tempo: f64,
    total_frames_played: Frames,
    /// Frames from the start of the current period until the release begins.
    frames_before_release: Frames,
    release_frames_to_do: Frames,
    release_frames_done: Frames,
    released: bool,
    release_started: bool,
    finished: bool,
    muted: bool,
}

impl FrameClock {
    pub fn new(period: Frames, offset: Frames, frames: Frames, tempo: f64) -> FrameClock {
        FrameClock {
            period: period.max(1),
            offset,
            frames,
            orig_frames: frames,
            orig_tempo: tempo,
            total_frames_played: 0,
            frames_before_release: 0,
            release_frames_to_do: 0,
            release_frames_done: 0,
            released: false,
            release_started: false,
            finished: false,
            muted: false,
        }
    }

    pub fn period(&self) -> Frames {
        self.period
    }

    pub fn offset(&self) -> Frames {
        self.offset
    }

    pub fn frames(&self) -> Frames {
        self.frames
    }

    pub fn total_frames_played(&self) -> Frames {
        self.total_frames_played
    }

    pub fn frames_before_release(&self) -> Frames {
        self.frames_before_release
    }

    pub fn release_frames_to_do(&self) -> Frames {
        self.release_frames_to_do
    }

    pub fn release_frames_done(&self) -> Frames {
        self.release_frames_done
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn release_started(&self) -> bool {
        self.release_started
    }

    pub fn is_marked_finished(&self) -> bool {
        self.finished
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn has_started(&self) -> bool {
        self.total_frames_played > 0
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub(crate) fn mute(&mut self) {
        self.muted = true;
    }

    /// Consumes one period of a deferred start. Returns true while the note
    /// still starts in a later period.
    pub(crate) fn defer_start(&mut self) -> bool {
        if self.offset >= self.period {
            self.offset -= self.period;
            return true;
        }
        false
    }

    /// Frames this note occupies in the current period.
    pub fn frames_this_period(&self) -> Frames {
        if self.total_frames_played == 0 {
            self.period.saturating_sub(self.offset)
        } else {
            self.period
        }
    }

    /// Offset within the current period at which an inferred release must
    /// start, if the scheduled length runs out during this period.
    pub fn inferred_release(&self) -> Option<Frames> {
        if self.released || self.total_frames_played + self.frames_this_period() <= self.frames {
            return None;
        }

        Some(if self.total_frames_played == 0 {
            self.frames + self.offset
        } else {
            // A sustain pedal may have kept the note past its length.
            self.frames.saturating_sub(self.total_frames_played)
        })
    }

    /// Frames still to be rendered.
    pub fn frames_left(&self, pedal_held: bool, release_tail: Frames) -> Frames {
        if pedal_held {
            self.period
        } else if self.released && release_tail == 0 {
            self.frames_before_release
        } else if self.released {
            self.frames_before_release + self.release_frames_to_do
                - self.release_frames_done.min(self.release_frames_to_do)
        } else {
            self.frames
                .saturating_add(release_tail)
                .saturating_sub(self.total_frames_played)
        }
    }

    pub fn frames_left_for_current_period(&self, frames_left: Frames) -> Frames {
        frames_left.min(self.frames_this_period())
    }

    /// Enters the released state. `has_children` keeps the release tail open
    /// long enough for sub-notes spawned in the next periods.
    pub(crate) fn begin_release(&mut self, offset: Frames, release_tail: Frames, has_children: bool) {
        self.released = true;
        self.frames_before_release = offset;
        self.release_frames_to_do = release_tail;
        if has_children {
            self.hold_for_children();
        }
    }

    fn hold_for_children(&mut self) {
        self.release_frames_to_do = self
            .release_frames_to_do
            .max(self.release_frames_done + 2 * self.period);
    }

    /// Advances the counters by one period.
    pub(crate) fn advance(&mut self, pedal_held: bool, has_children: bool) {
        let frames_this_period = self.frames_this_period();

        if self.released && (!pedal_held || self.release_started) {
            self.release_started = true;
            if has_children {
                self.hold_for_children();
            }

            // The release offset is relative to the start of the period.
            let mut todo = self.period;
            if self.frames_before_release > 0 {
                if self.frames_before_release <= todo {
                    todo -= self.frames_before_release;
                    self.frames_before_release = 0;
                } else {
                    self.frames_before_release -= todo;
                    todo = 0;
                }
            }

            if todo > 0 && self.release_frames_done < self.release_frames_to_do {
                self.release_frames_done =
                    (self.release_frames_done + todo).min(self.release_frames_to_do);
            }
        }

        self.total_frames_played += frames_this_period;
    }

    /// Rescales the scheduled length to a new tempo, keeping the fraction
    /// already played.
    pub(crate) fn resize(&mut self, new_tempo: f64) {
        if new_tempo <= 0.0 || self.frames == 0 {
            return;
        }

        let completed = self.total_frames_played as f64 / self.frames as f64;
        let new_frames = self.orig_frames as f64 * self.orig_tempo / new_tempo;
        self.frames = new_frames.round() as Frames;
        self.total_frames_played = (completed * new_frames).round() as Frames;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_left_before_release() {
        let clock = FrameClock::new(256, 0, 1000, 120.0);
        assert_eq!(clock.frames_left(false, 200), 1200);
        assert_eq!(clock.frames_left(true, 200), 256);
    }

    #[test]
    fn test_first_period_respects_offset() {
        let mut clock = FrameClock::new(256, 100, 1000, 120.0);
        assert_eq!(clock.frames_this_period(), 156);
        clock.advance(false, false);
        assert_eq!(clock.total_frames_played(), 156);
        assert_eq!(clock.frames_this_period(), 256);
    }

    #[test]
    fn test_inferred_release_offset() {
        // Note-on and note-off in the same period.
        let clock = FrameClock::new(256, 50, 100, 120.0);
        assert_eq!(clock.inferred_release(), Some(150));

        let mut clock = FrameClock::new(256, 0, 600, 120.0);
        clock.advance(false, false);
        assert_eq!(clock.inferred_release(), None);
        clock.advance(false, false);
        assert_eq!(clock.inferred_release(), Some(88));
    }

    #[test]
    fn test_inferred_release_after_overrun() {
        let mut clock = FrameClock::new(100, 0, 150, 120.0);
        clock.advance(true, false);
        clock.advance(true, false);
        assert_eq!(clock.total_frames_played(), 200);
        assert_eq!(clock.inferred_release(), Some(0));
    }

    #[test]
    fn test_release_counters() {
        let mut clock = FrameClock::new(512, 0, 1000, 120.0);
        clock.begin_release(400, 200, false);
        assert_eq!(clock.frames_left(false, 200), 600);

        clock.advance(false, false);
        assert_eq!(clock.frames_before_release(), 0);
        assert_eq!(clock.release_frames_done(), 112);
        assert_eq!(clock.frames_left(false, 200), 88);

        clock.advance(false, false);
        assert_eq!(clock.release_frames_done(), 200);
        assert_eq!(clock.frames_left(false, 200), 0);
    }

    #[test]
    fn test_release_waits_for_pedal() {
        let mut clock = FrameClock::new(256, 0, 1000, 120.0);
        clock.begin_release(0, 100, false);
        clock.advance(true, false);
        assert!(!clock.release_started());
        assert_eq!(clock.release_frames_done(), 0);

        clock.advance(false, false);
        assert!(clock.release_started());
        assert_eq!(clock.release_frames_done(), 100);
    }

    #[test]
    fn test_children_hold_release_open() {
        let mut clock = FrameClock::new(128, 0, 1000, 120.0);
        clock.begin_release(0, 0, true);
        assert_eq!(clock.release_frames_to_do(), 256);
        clock.advance(false, true);
        assert_eq!(clock.release_frames_done(), 128);
        assert_eq!(clock.release_frames_to_do(), 256);
    }

    #[test]
    fn test_resize_keeps_ratio() {
        let mut clock = FrameClock::new(100, 0, 1000, 120.0);
        for _ in 0..3 {
            clock.advance(false, false);
        }
        clock.resize(60.0);
        assert_eq!(clock.frames(), 2000);
        assert_eq!(clock.total_frames_played(), 600);

        // Always relative to the original length.
        clock.resize(120.0);
        assert_eq!(clock.frames(), 1000);
        assert_eq!(clock.total_frames_played(), 300);
    }

    #[test]
    fn test_defer_start() {
        let mut clock = FrameClock::new(256, 600, 1000, 120.0);
        assert!(clock.defer_start());
        assert!(clock.defer_start());
        assert_eq!(clock.offset(), 88);
        assert!(!clock.defer_start());
    }
}
