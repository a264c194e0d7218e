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

//! Pitch change notifications from control threads to the render thread.

use crossbeam_channel::Sender;
use tracing::error;

use crate::track::TrackId;

/// A change that invalidates cached note frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchEvent {
    /// Base note, bend range or scale of a track changed.
    TrackPitchChanged(TrackId),
    /// The song master pitch changed, in semitones.
    MasterPitchChanged(i32),
    /// Tuning changed everywhere.
    TuningChanged,
}

/// Sends pitch events to the render thread. Events are applied at the start
/// of the next period.
#[derive(Clone)]
pub struct PitchNotifier {
    tx: Sender<PitchEvent>,
}

impl PitchNotifier {
    pub(crate) fn new(tx: Sender<PitchEvent>) -> PitchNotifier {
        PitchNotifier { tx }
    }

    pub fn notify(&self, event: PitchEvent) {
        if let Err(e) = self.tx.send(event) {
            error!(error = %e, "Failed to send pitch event to render thread");
        }
    }
}
