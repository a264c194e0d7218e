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

//! A single sounding note.
//!
//! A [`NoteEvent`] combines a note value ([`HasNote`]) with a frame clock
//! ([`PlayHandle`]). Parent and sub-notes are referenced by [`NoteId`] only; the
//! [`NoteEventManager`](crate::manager::NoteEventManager) owns every event and
//! performs anything that crosses from one note to another.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use midly::live::LiveEvent;
use midly::MidiMessage;

use crate::engine::Transport;
use crate::note::{Note, Origin};
use crate::scale::Scale;
use crate::track::Track;

mod pitch;
mod timing;

pub use pitch::{PitchCache, PitchInputs};
pub use timing::{FrameClock, Frames};

/// Process-wide note identity counter.
static NEXT_NOTE_ID: AtomicU64 = AtomicU64::new(1);

/// The identity of a note event. Unique within the process, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(u64);

impl NoteId {
    pub(crate) fn next() -> NoteId {
        NoteId(NEXT_NOTE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Timing as seen by the scheduler and the track.
pub trait PlayHandle {
    fn offset(&self) -> Frames;
    fn total_frames_played(&self) -> Frames;
    fn is_released(&self) -> bool;
    fn frames_left(&self) -> Frames;
    fn frames_left_for_current_period(&self) -> Frames;

    /// First frame of the working buffer this note renders into.
    fn render_start(&self) -> Frames {
        if self.total_frames_played() == 0 {
            self.offset()
        } else {
            0
        }
    }
}

/// Access to the note value being played.
pub trait HasNote {
    fn note(&self) -> &Note;

    fn key(&self) -> i32 {
        self.note().key()
    }
}

/// One sounding note.
pub struct NoteEvent {
    pub(crate) id: NoteId,
    pub(crate) track: Arc<dyn Track>,
    pub(crate) midi_channel: u8,
    pub(crate) origin: Origin,
    pub(crate) generation: u32,
    pub(crate) note: Note,
    pub(crate) clock: FrameClock,
    pub(crate) pitch: PitchCache,
    pub(crate) scale_override: Option<Arc<dyn Scale>>,
    pub(crate) parent: Option<NoteId>,
    pub(crate) children: Vec<NoteId>,
    pub(crate) master: bool,
    pub(crate) note_on_sent: bool,
    pub(crate) note_off_sent: bool,
}

impl NoteEvent {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: NoteId,
        track: Arc<dyn Track>,
        note: Note,
        clock: FrameClock,
        parent: Option<NoteId>,
        midi_channel: Option<u8>,
        origin: Origin,
        generation: u32,
    ) -> NoteEvent {
        let midi_channel = midi_channel.unwrap_or_else(|| track.midi_channel()).min(15);
        NoteEvent {
            id,
            track,
            midi_channel,
            origin,
            generation,
            note,
            clock,
            pitch: PitchCache::new(),
            scale_override: None,
            parent,
            children: Vec::new(),
            master: false,
            note_on_sent: false,
            note_off_sent: false,
        }
    }

    pub fn id(&self) -> NoteId {
        self.id
    }

    pub fn track(&self) -> &Arc<dyn Track> {
        &self.track
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn midi_channel(&self) -> u8 {
        self.midi_channel
    }

    pub fn timing(&self) -> &FrameClock {
        &self.clock
    }

    pub fn parent(&self) -> Option<NoteId> {
        self.parent
    }

    pub fn children(&self) -> &[NoteId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// A master note defers rendering to its sub-notes.
    pub fn is_master(&self) -> bool {
        self.master
    }

    pub fn is_muted(&self) -> bool {
        self.clock.is_muted()
    }

    pub fn frequency(&self) -> f64 {
        self.pitch.frequency()
    }

    pub fn unpitched_frequency(&self) -> f64 {
        self.pitch.unpitched_frequency()
    }

    pub fn pitch(&self) -> &PitchCache {
        &self.pitch
    }

    /// The scale used for this note: the override if set, else the track's.
    pub fn scale(&self) -> &dyn Scale {
        match &self.scale_override {
            Some(scale) => scale.as_ref(),
            None => self.track.scale(),
        }
    }

    /// Released with nothing left to render. Ignores the hierarchy.
    pub fn is_done_playing(&self) -> bool {
        self.clock.is_released() && self.frames_left() == 0
    }

    /// Whether this note sends its own MIDI messages. An arpeggiated master
    /// leaves that to its sub-notes.
    pub(crate) fn emits_midi(&self) -> bool {
        !(self.master && self.track.arpeggio_enabled())
    }

    /// The key sent over MIDI, after the track's transpose.
    pub fn midi_key(&self) -> u8 {
        self.note.midi_key(self.track.midi_transpose())
    }

    pub(crate) fn midi_note_on_event(&self) -> LiveEvent<'static> {
        LiveEvent::Midi {
            channel: self.midi_channel.into(),
            message: MidiMessage::NoteOn {
                key: self.midi_key().into(),
                vel: self.note.midi_velocity().into(),
            },
        }
    }

    pub(crate) fn midi_note_off_event(&self) -> LiveEvent<'static> {
        LiveEvent::Midi {
            channel: self.midi_channel.into(),
            message: MidiMessage::NoteOff {
                key: self.midi_key().into(),
                vel: 0.into(),
            },
        }
    }

    pub(crate) fn send_note_on(&mut self, offset: Frames) {
        if !self.note_on_sent && self.emits_midi() {
            self.track
                .midi_note_on(self, self.midi_note_on_event(), offset);
        }
        self.note_on_sent = true;
    }

    /// Sends the note-off matching a sent note-on, at most once.
    pub(crate) fn send_note_off(&mut self, offset: Frames) {
        if self.note_off_sent || !self.note_on_sent {
            return;
        }
        if self.emits_midi() {
            self.track
                .midi_note_off(self, self.midi_note_off_event(), offset);
        }
        self.note_off_sent = true;
    }

    /// Resets per-period detune contributions and samples the automation curve.
    pub(crate) fn begin_period(&mut self, transport: &Transport) {
        self.pitch.reset_effect_detune();
        if !transport.is_playing() {
            return;
        }
        if let Some(curve) = self.note.detuning() {
            let cents = curve.value_at(transport.ticks());
            self.pitch.set_automation_detune(cents);
        }
    }

    /// Recomputes the cached frequencies from the track and the given master pitch.
    pub(crate) fn update_frequency(&mut self, master_pitch: i32) {
        let inputs = PitchInputs {
            relative_key: self.note.key() - self.track.base_note(),
            master_pitch: if self.track.master_pitch_enabled() {
                master_pitch
            } else {
                0
            },
            bend: if self.track.bending_enabled() {
                self.track.bending_value()
            } else {
                0.0
            },
        };
        let scale = match &self.scale_override {
            Some(scale) => scale.as_ref(),
            None => self.track.scale(),
        };
        self.pitch.recompute(inputs, scale);
    }
}

impl PlayHandle for NoteEvent {
    fn offset(&self) -> Frames {
        self.clock.offset()
    }

    fn total_frames_played(&self) -> Frames {
        self.clock.total_frames_played()
    }

    fn is_released(&self) -> bool {
        self.clock.is_released()
    }

    fn frames_left(&self) -> Frames {
        self.clock.frames_left(
            self.track.sustain_pedal_held(),
            self.track.release_tail_frames(),
        )
    }

    fn frames_left_for_current_period(&self) -> Frames {
        self.clock
            .frames_left_for_current_period(self.frames_left())
    }
}

impl HasNote for NoteEvent {
    fn note(&self) -> &Note {
        &self.note
    }
}

impl fmt::Debug for NoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoteEvent")
            .field("id", &self.id)
            .field("track", &self.track.id())
            .field("origin", &self.origin)
            .field("note", &self.note)
            .field("clock", &self.clock)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("master", &self.master)
            .finish()
    }
}
