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

//! Instrument functions: per-period hooks that spawn sub-notes or modulate a
//! note before it plays.

use crate::event::NoteId;
use crate::manager::NoteEventManager;

mod arpeggio;
mod chord;
mod glissando;

pub use arpeggio::Arpeggio;
pub use chord::ChordStacking;
pub use glissando::Glissando;

/// A hook run on the render thread for every live note of a track, after the
/// note's period has begun and before it plays.
pub trait NoteFunction: Send {
    fn process(&self, manager: &mut NoteEventManager, id: NoteId);
}
