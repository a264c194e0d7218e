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
use tracing::{trace, warn};

use super::NoteFunction;
use crate::event::{Frames, HasNote, NoteId, PlayHandle};
use crate::manager::{NoteEventManager, NoteRequest};
use crate::note::{Note, Origin};

/// Plays a note as a sequence of short sub-notes cycling through
/// `intervals`, one every `step_frames`.
#[derive(Debug, Clone)]
pub struct Arpeggio {
    intervals: Vec<i32>,
    step_frames: Frames,
    /// Fraction of a step each sub-note sounds for.
    gate: f64,
}

impl Arpeggio {
    pub fn new(intervals: Vec<i32>, step_frames: Frames, gate: f64) -> Arpeggio {
        Arpeggio {
            intervals: if intervals.is_empty() {
                vec![0]
            } else {
                intervals
            },
            step_frames: step_frames.max(1),
            gate: gate.clamp(0.0, 1.0),
        }
    }

    fn step_length(&self) -> Frames {
        ((self.step_frames as f64 * self.gate) as Frames).max(1)
    }
}

impl NoteFunction for Arpeggio {
    fn process(&self, manager: &mut NoteEventManager, id: NoteId) {
        let period = manager.frames_per_period();
        let Some(event) = manager.get(id) else {
            return;
        };
        if matches!(event.origin(), Origin::Arpeggio | Origin::NoteStacking)
            || event.is_released()
            || event.offset() >= period
        {
            return;
        }

        let clock = event.timing();
        let played = clock.total_frames_played();
        let lead = if played == 0 { clock.offset() } else { 0 };
        // Span of the note timeline covered by this period.
        let window_end = played + period - lead;
        let frames = clock.frames();

        let mut requests = Vec::new();
        let mut step = played.div_ceil(self.step_frames);
        loop {
            let position = step * self.step_frames;
            if position >= window_end || position >= frames {
                break;
            }
            let interval = self.intervals[(step % self.intervals.len() as u64) as usize];
            let key = event.key() + interval;
            if Note::is_valid_key(key) {
                requests.push(
                    NoteRequest::sub_note(event, event.note().with_key(key), Origin::Arpeggio)
                        .offset(position - played + lead)
                        .frames(self.step_length()),
                );
            }
            step += 1;
        }

        manager.set_master(id);
        for request in requests {
            match manager.acquire(request) {
                Ok(child) => trace!(note = %id, step = %child, "Arpeggio step"),
                Err(e) => warn!(note = %id, err = %e, "Failed to spawn arpeggio step"),
            }
        }
    }
}
