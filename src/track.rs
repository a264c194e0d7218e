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

//! The instrument track a note plays on.
//!
//! Tracks do the actual synthesis and own the MIDI output. The note lifecycle
//! only calls into them; every method here may be invoked from the render
//! thread and must not block.

use std::fmt;

use midly::live::LiveEvent;

use crate::event::{Frames, NoteEvent, NoteId};
use crate::scale::Scale;

pub mod mock;

/// Identifies a track for pitch notifications and function lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u32);

impl TrackId {
    pub const fn new(id: u32) -> TrackId {
        TrackId(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track-{}", self.0)
    }
}

/// A sample-accurate detune automation curve, in cents, indexed by the song's
/// transport position in ticks.
pub trait DetuneCurve: Send + Sync {
    fn value_at(&self, ticks: f64) -> f64;
}

/// The owning track/instrument of a note.
pub trait Track: Send + Sync {
    fn id(&self) -> TrackId;

    /// Renders the note into the interleaved working buffer. The track writes
    /// `frames_left_for_current_period()` frames starting at
    /// `render_start()`.
    fn play_note(&self, event: &NoteEvent, buffer: &mut [f32]);

    /// Length of the release tail applied after note-off.
    fn release_tail_frames(&self) -> Frames;

    /// Default length for notes scheduled without one.
    fn beat_length_frames(&self) -> Frames;

    /// The key that maps to key `0` of the scale.
    fn base_note(&self) -> i32;

    fn scale(&self) -> &dyn Scale;

    fn bending_enabled(&self) -> bool;

    /// Current pitch bend in cents.
    fn bending_value(&self) -> f64;

    fn master_pitch_enabled(&self) -> bool;

    fn sustain_pedal_held(&self) -> bool;

    /// Releases any per-note synthesis state the instrument attached to the note.
    fn delete_note_plugin_data(&self, id: NoteId);

    fn midi_note_on(&self, event: &NoteEvent, message: LiveEvent<'static>, offset: Frames);

    fn midi_note_off(&self, event: &NoteEvent, message: LiveEvent<'static>, offset: Frames);

    /// Adds a top-level note to the track's active notes.
    fn attach_note(&self, id: NoteId);

    /// Removes a top-level note from the track's active notes.
    fn detach_note(&self, id: NoteId);

    /// Single-streamed instruments render all notes at once, so notes never
    /// render into a per-note buffer.
    fn is_single_streamed(&self) -> bool {
        false
    }

    /// An arpeggiated master note leaves MIDI output to its sub-notes.
    fn arpeggio_enabled(&self) -> bool {
        false
    }

    fn midi_channel(&self) -> u8 {
        0
    }

    /// Semitones added to note keys on the MIDI output.
    fn midi_transpose(&self) -> i32 {
        0
    }
}
