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

//! The note value: what is played, independent of when it is played.

use std::fmt;
use std::sync::Arc;

use crate::track::DetuneCurve;

/// Number of addressable keys.
pub const NUM_KEYS: i32 = 128;

/// A3. Tracks use this as their base note unless configured otherwise.
pub const DEFAULT_KEY: i32 = 57;

pub const MIN_VOLUME: u8 = 0;
pub const MAX_VOLUME: u8 = 200;
pub const DEFAULT_VOLUME: u8 = 100;

pub const PANNING_LEFT: i8 = -100;
pub const PANNING_RIGHT: i8 = 100;
pub const DEFAULT_PANNING: i8 = 0;

/// Where a note came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Origin {
    /// A note scheduled from a pattern.
    #[default]
    Pattern,
    /// A note played live; its length is open-ended until the key is released.
    MidiInput,
    /// A sub-note spawned by chord stacking.
    NoteStacking,
    /// A sub-note spawned by the arpeggiator.
    Arpeggio,
}

/// A note value. Lengths and positions are in ticks of the song timeline.
#[derive(Clone)]
pub struct Note {
    key: i32,
    volume: u8,
    panning: i8,
    position: i64,
    length: i64,
    detuning: Option<Arc<dyn DetuneCurve>>,
}

impl Note {
    /// Creates a note for the given key at default volume and panning.
    pub fn new(key: i32) -> Note {
        Note {
            key,
            volume: DEFAULT_VOLUME,
            panning: DEFAULT_PANNING,
            position: 0,
            length: 0,
            detuning: None,
        }
    }

    pub fn with_volume(mut self, volume: u8) -> Note {
        self.volume = volume.min(MAX_VOLUME);
        self
    }

    pub fn with_panning(mut self, panning: i8) -> Note {
        self.panning = panning.clamp(PANNING_LEFT, PANNING_RIGHT);
        self
    }

    pub fn with_position(mut self, position: i64) -> Note {
        self.position = position;
        self
    }

    pub fn with_length(mut self, length: i64) -> Note {
        self.length = length;
        self
    }

    /// Attaches a detune automation curve, sampled once per period.
    pub fn with_detuning(mut self, detuning: Arc<dyn DetuneCurve>) -> Note {
        self.detuning = Some(detuning);
        self
    }

    /// Returns a copy of this note transposed to a different key.
    pub fn with_key(&self, key: i32) -> Note {
        Note {
            key,
            ..self.clone()
        }
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn panning(&self) -> i8 {
        self.panning
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn detuning(&self) -> Option<&Arc<dyn DetuneCurve>> {
        self.detuning.as_ref()
    }

    /// Whether the key can be addressed at all.
    pub fn is_valid_key(key: i32) -> bool {
        (0..NUM_KEYS).contains(&key)
    }

    /// The MIDI key after `transpose` semitones, clamped to the 7 bit range.
    pub fn midi_key(&self, transpose: i32) -> u8 {
        (self.key + transpose).clamp(0, 127) as u8
    }

    /// The MIDI velocity derived from the note volume. The default volume maps
    /// to half velocity and the maximum volume to full velocity.
    pub fn midi_velocity(&self) -> u8 {
        (self.volume as u32 * 127 / MAX_VOLUME as u32).min(127) as u8
    }
}

impl Default for Note {
    fn default() -> Self {
        Note::new(DEFAULT_KEY)
    }
}

impl fmt::Debug for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Note")
            .field("key", &self.key)
            .field("volume", &self.volume)
            .field("panning", &self.panning)
            .field("position", &self.position)
            .field("length", &self.length)
            .field("detuning", &self.detuning.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_clamp() {
        let note = Note::new(60).with_volume(255).with_panning(-128);
        assert_eq!(note.volume(), MAX_VOLUME);
        assert_eq!(note.panning(), PANNING_LEFT);
    }

    #[test]
    fn test_midi_mapping() {
        assert_eq!(Note::new(60).midi_velocity(), 63);
        assert_eq!(Note::new(60).with_volume(MAX_VOLUME).midi_velocity(), 127);
        assert_eq!(Note::new(-3).midi_key(0), 0);
        assert_eq!(Note::new(200).midi_key(0), 127);
        assert_eq!(Note::new(60).midi_key(-12), 48);
    }

    #[test]
    fn test_with_key_keeps_value() {
        let note = Note::new(60).with_volume(80).with_length(192);
        let moved = note.with_key(64);
        assert_eq!(moved.key(), 64);
        assert_eq!(moved.volume(), 80);
        assert_eq!(moved.length(), 192);
        assert!(Note::is_valid_key(127));
        assert!(!Note::is_valid_key(NUM_KEYS));
    }
}
