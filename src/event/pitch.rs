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

//! Cached frequency of a note and the detune sources feeding it.

use crate::scale::Scale;

/// The inputs to a frequency computation that do not live on the note itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchInputs {
    /// Key relative to the track's base note.
    pub relative_key: i32,
    /// Song master pitch in semitones, zero when the track ignores it.
    pub master_pitch: i32,
    /// Pitch bend in cents, zero when bending is disabled.
    pub bend: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitchCache {
    frequency: f64,
    unpitched_frequency: f64,
    automation_detune: f64,
    effect_detune: f64,
    dirty: bool,
}

impl PitchCache {
    pub fn new() -> PitchCache {
        PitchCache {
            frequency: 0.0,
            unpitched_frequency: 0.0,
            automation_detune: 0.0,
            effect_detune: 0.0,
            dirty: true,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn unpitched_frequency(&self) -> f64 {
        self.unpitched_frequency
    }

    pub fn automation_detune(&self) -> f64 {
        self.automation_detune
    }

    pub fn effect_detune(&self) -> f64 {
        self.effect_detune
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn set_automation_detune(&mut self, cents: f64) {
        if cents != self.automation_detune {
            self.automation_detune = cents;
            self.dirty = true;
        }
    }

    /// Effect detune accumulates over every contribution in a period.
    pub fn add_effect_detune(&mut self, cents: f64) {
        if cents != 0.0 {
            self.effect_detune += cents;
            self.dirty = true;
        }
    }

    pub fn reset_effect_detune(&mut self) {
        if self.effect_detune != 0.0 {
            self.effect_detune = 0.0;
            self.dirty = true;
        }
    }

    pub fn recompute(&mut self, inputs: PitchInputs, scale: &dyn Scale) {
        let key = inputs.relative_key + inputs.master_pitch;
        let detune = inputs.bend + self.automation_detune + self.effect_detune;
        self.frequency = scale.frequency(key, detune);
        self.unpitched_frequency = scale.frequency(key, 0.0);
        self.dirty = false;
    }
}

impl Default for PitchCache {
    fn default() -> Self {
        PitchCache::new()
    }
}
