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

//! Note-event lifecycle and real-time scheduling.
//!
//! A [`NoteEvent`] represents one sounding note across many fixed-size render
//! periods. The [`NoteEventManager`] creates events, owns them in an arena
//! keyed by [`NoteId`], coordinates parent/sub-note hierarchies and tears each
//! event down exactly once. The [`RenderEngine`] is a reference render loop
//! that drives the manager once per period.

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod functions;
pub mod manager;
pub mod note;
pub mod scale;
pub mod track;

#[cfg(test)]
mod testutil;

pub use config::EngineConfig;
pub use engine::{PitchEvent, PitchNotifier, RenderEngine, Transport};
pub use error::{NoteError, ReleaseError, SpawnError};
pub use event::{Frames, FrameClock, HasNote, NoteEvent, NoteId, PlayHandle};
pub use functions::{Arpeggio, ChordStacking, Glissando, NoteFunction};
pub use manager::{NoteEventManager, NoteRequest, NoteSpawner, ReleaseCount};
pub use note::{Note, Origin};
pub use scale::{EqualTemperament, Scale, TableScale};
pub use track::{DetuneCurve, Track, TrackId};
