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

//! Error types for the note lifecycle.
//!
//! None of these unwind across the render thread. Every error is logged at the
//! point it is detected and then returned so callers can count or ignore it.

use crate::event::{Frames, NoteId};

/// Reasons a release request was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReleaseError {
    #[error("note {0} has already been released")]
    DoubleRelease(NoteId),
    #[error("note {0} is not finished")]
    NotFinished(NoteId),
    #[error("note {0} is not known to this manager")]
    UnknownNote(NoteId),
    #[error("note {id} still holds {count} sub-note(s)")]
    DanglingChildren { id: NoteId, count: usize },
    #[error("note {0} was released outside of the render thread")]
    WrongThread(NoteId),
}

/// Errors from per-note operations on the render thread.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NoteError {
    #[error("note {0} is not known to this manager")]
    UnknownNote(NoteId),
    #[error("parent note {0} is not known to this manager")]
    UnknownParent(NoteId),
    #[error("offset {offset} of note {id} is outside of a {period} frame period")]
    OffsetOutOfRange {
        id: NoteId,
        offset: Frames,
        period: Frames,
    },
}

/// Errors handing a note over to the render thread.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpawnError {
    #[error("the render side of the note channel has been dropped")]
    Disconnected,
}
