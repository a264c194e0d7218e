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
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use midly::live::LiveEvent;
use midly::MidiMessage;
use parking_lot::Mutex;
use tracing::trace;

use super::{Track, TrackId};
use crate::event::{Frames, HasNote, NoteEvent, NoteId, PlayHandle};
use crate::note::{DEFAULT_KEY, MAX_VOLUME};
use crate::scale::EqualTemperament;

/// A MIDI message the mock track was asked to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiRecord {
    pub id: NoteId,
    pub key: u8,
    pub channel: u8,
    pub offset: Frames,
}

/// A mock track. Renders a constant level scaled by note volume and records
/// every callback it receives.
pub struct MockTrack {
    id: TrackId,
    channels: usize,
    scale: EqualTemperament,
    base_note: i32,
    beat_length: Frames,
    release_tail: AtomicU64,
    sustain_pedal: AtomicBool,
    bending: bool,
    bend_millicents: AtomicI64,
    master_pitch: bool,
    single_streamed: bool,
    arpeggio: bool,
    midi_channel: u8,
    midi_transpose: i32,
    note_ons: Mutex<Vec<MidiRecord>>,
    note_offs: Mutex<Vec<MidiRecord>>,
    rendered: Mutex<HashMap<NoteId, Frames>>,
    deleted: Mutex<Vec<NoteId>>,
    attached: Mutex<Vec<NoteId>>,
}

impl MockTrack {
    /// Creates a stereo mock track on the default 12-TET scale.
    pub fn new(id: u32) -> MockTrack {
        MockTrack {
            id: TrackId::new(id),
            channels: 2,
            scale: EqualTemperament::default(),
            base_note: DEFAULT_KEY,
            beat_length: 0,
            release_tail: AtomicU64::new(0),
            sustain_pedal: AtomicBool::new(false),
            bending: false,
            bend_millicents: AtomicI64::new(0),
            master_pitch: true,
            single_streamed: false,
            arpeggio: false,
            midi_channel: 0,
            midi_transpose: 0,
            note_ons: Mutex::new(Vec::new()),
            note_offs: Mutex::new(Vec::new()),
            rendered: Mutex::new(HashMap::new()),
            deleted: Mutex::new(Vec::new()),
            attached: Mutex::new(Vec::new()),
        }
    }

    pub fn with_channels(mut self, channels: usize) -> MockTrack {
        self.channels = channels.max(1);
        self
    }

    pub fn with_release_tail(self, frames: Frames) -> MockTrack {
        self.release_tail.store(frames, Ordering::Relaxed);
        self
    }

    pub fn with_beat_length(mut self, frames: Frames) -> MockTrack {
        self.beat_length = frames;
        self
    }

    pub fn with_base_note(mut self, base_note: i32) -> MockTrack {
        self.base_note = base_note;
        self
    }

    pub fn with_bending(mut self, enabled: bool) -> MockTrack {
        self.bending = enabled;
        self
    }

    pub fn with_master_pitch(mut self, enabled: bool) -> MockTrack {
        self.master_pitch = enabled;
        self
    }

    pub fn with_single_stream(mut self, enabled: bool) -> MockTrack {
        self.single_streamed = enabled;
        self
    }

    pub fn with_arpeggio(mut self, enabled: bool) -> MockTrack {
        self.arpeggio = enabled;
        self
    }

    pub fn with_midi_channel(mut self, channel: u8) -> MockTrack {
        self.midi_channel = channel.min(15);
        self
    }

    pub fn with_midi_transpose(mut self, semitones: i32) -> MockTrack {
        self.midi_transpose = semitones;
        self
    }

    pub fn set_release_tail(&self, frames: Frames) {
        self.release_tail.store(frames, Ordering::Relaxed);
    }

    pub fn set_sustain_pedal(&self, held: bool) {
        self.sustain_pedal.store(held, Ordering::Relaxed);
    }

    pub fn set_bend(&self, cents: f64) {
        self.bend_millicents
            .store((cents * 1000.0).round() as i64, Ordering::Relaxed);
    }

    pub fn note_ons(&self) -> Vec<MidiRecord> {
        self.note_ons.lock().clone()
    }

    pub fn note_offs(&self) -> Vec<MidiRecord> {
        self.note_offs.lock().clone()
    }

    /// Total frames rendered for a note across all periods.
    pub fn rendered_frames(&self, id: NoteId) -> Frames {
        self.rendered.lock().get(&id).copied().unwrap_or(0)
    }

    pub fn was_rendered(&self, id: NoteId) -> bool {
        self.rendered.lock().contains_key(&id)
    }

    pub fn deleted(&self) -> Vec<NoteId> {
        self.deleted.lock().clone()
    }

    pub fn attached(&self) -> Vec<NoteId> {
        self.attached.lock().clone()
    }

    fn record(records: &Mutex<Vec<MidiRecord>>, id: NoteId, message: LiveEvent, offset: Frames) {
        if let LiveEvent::Midi { channel, message } = message {
            let key = match message {
                MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => key,
                _ => return,
            };
            records.lock().push(MidiRecord {
                id,
                key: u8::from(key),
                channel: u8::from(channel),
                offset,
            });
        }
    }
}

impl Track for MockTrack {
    fn id(&self) -> TrackId {
        self.id
    }

    fn play_note(&self, event: &NoteEvent, buffer: &mut [f32]) {
        let start = event.render_start() as usize;
        let frames = event.frames_left_for_current_period() as usize;
        let level = 0.5 * event.note().volume() as f32 / MAX_VOLUME as f32;

        let end = ((start + frames) * self.channels).min(buffer.len());
        let begin = (start * self.channels).min(end);
        buffer[begin..end].iter_mut().for_each(|sample| *sample += level);

        *self.rendered.lock().entry(event.id()).or_insert(0) += frames as Frames;
        trace!(note = %event.id(), start, frames, "Mock render");
    }

    fn release_tail_frames(&self) -> Frames {
        self.release_tail.load(Ordering::Relaxed)
    }

    fn beat_length_frames(&self) -> Frames {
        self.beat_length
    }

    fn base_note(&self) -> i32 {
        self.base_note
    }

    fn scale(&self) -> &dyn crate::scale::Scale {
        &self.scale
    }

    fn bending_enabled(&self) -> bool {
        self.bending
    }

    fn bending_value(&self) -> f64 {
        self.bend_millicents.load(Ordering::Relaxed) as f64 / 1000.0
    }

    fn master_pitch_enabled(&self) -> bool {
        self.master_pitch
    }

    fn sustain_pedal_held(&self) -> bool {
        self.sustain_pedal.load(Ordering::Relaxed)
    }

    fn delete_note_plugin_data(&self, id: NoteId) {
        self.deleted.lock().push(id);
    }

    fn midi_note_on(&self, event: &NoteEvent, message: LiveEvent<'static>, offset: Frames) {
        Self::record(&self.note_ons, event.id(), message, offset);
    }

    fn midi_note_off(&self, event: &NoteEvent, message: LiveEvent<'static>, offset: Frames) {
        Self::record(&self.note_offs, event.id(), message, offset);
    }

    fn attach_note(&self, id: NoteId) {
        self.attached.lock().push(id);
    }

    fn detach_note(&self, id: NoteId) {
        self.attached.lock().retain(|attached| *attached != id);
    }

    fn is_single_streamed(&self) -> bool {
        self.single_streamed
    }

    fn arpeggio_enabled(&self) -> bool {
        self.arpeggio
    }

    fn midi_channel(&self) -> u8 {
        self.midi_channel
    }

    fn midi_transpose(&self) -> i32 {
        self.midi_transpose
    }
}
