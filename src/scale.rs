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

//! Tuning lookups: key plus cents to frequency.
//!
//! Keys handed to a scale are relative to the owning track's base note, so key
//! `0` always sounds at the scale's base frequency.

/// Frequency of the base note (A3) of the default tuning.
pub const DEFAULT_BASE_FREQUENCY: f64 = 220.0;

const CENTS_PER_OCTAVE: f64 = 1200.0;

/// Maps a key and a cents offset to a frequency in Hz. Implementations must be
/// pure and must not allocate, they are called on the render thread.
pub trait Scale: Send + Sync {
    fn frequency(&self, key: i32, cents: f64) -> f64;
}

/// Splits a cents value into whole octaves and a remainder so integer octave
/// multiples are exact.
fn octave_multiple(base: f64, cents: f64) -> f64 {
    let octaves = (cents / CENTS_PER_OCTAVE).floor();
    let remainder = cents - octaves * CENTS_PER_OCTAVE;
    base * 2f64.powi(octaves as i32) * (remainder / CENTS_PER_OCTAVE).exp2()
}

/// Equal division of the octave, 12 steps by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualTemperament {
    base_frequency: f64,
    steps_per_octave: u32,
}

impl EqualTemperament {
    pub fn new(base_frequency: f64, steps_per_octave: u32) -> EqualTemperament {
        EqualTemperament {
            base_frequency,
            steps_per_octave: steps_per_octave.max(1),
        }
    }

    pub fn base_frequency(&self) -> f64 {
        self.base_frequency
    }
}

impl Default for EqualTemperament {
    fn default() -> Self {
        EqualTemperament::new(DEFAULT_BASE_FREQUENCY, 12)
    }
}

impl Scale for EqualTemperament {
    fn frequency(&self, key: i32, cents: f64) -> f64 {
        let step = CENTS_PER_OCTAVE / self.steps_per_octave as f64;
        octave_multiple(self.base_frequency, key as f64 * step + cents)
    }
}

/// A tuning table: cents for each degree above the base note, repeating every
/// `period_cents`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableScale {
    base_frequency: f64,
    degrees: Vec<f64>,
    period_cents: f64,
}

impl TableScale {
    /// Returns `None` for an empty table or a non-positive period.
    pub fn new(base_frequency: f64, degrees: Vec<f64>, period_cents: f64) -> Option<TableScale> {
        if degrees.is_empty() || period_cents <= 0.0 {
            return None;
        }

        Some(TableScale {
            base_frequency,
            degrees,
            period_cents,
        })
    }
}

impl Scale for TableScale {
    fn frequency(&self, key: i32, cents: f64) -> f64 {
        let len = self.degrees.len() as i32;
        let period = key.div_euclid(len) as f64;
        let degree = self.degrees[key.rem_euclid(len) as usize];
        octave_multiple(
            self.base_frequency,
            period * self.period_cents + degree + cents,
        )
    }
}
