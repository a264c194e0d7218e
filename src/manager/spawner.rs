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

//! Creating notes from outside the render thread.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::debug;

use crate::error::SpawnError;
use crate::event::{Frames, NoteEvent, NoteId, PlayHandle};
use crate::note::{Note, Origin};
use crate::scale::Scale;
use crate::track::Track;

/// Everything needed to create a note event.
#[derive(Clone)]
pub struct NoteRequest {
    pub(crate) track: Arc<dyn Track>,
    pub(crate) note: Note,
    pub(crate) offset: Frames,
    pub(crate) frames: Frames,
    pub(crate) parent: Option<NoteId>,
    pub(crate) midi_channel: Option<u8>,
    pub(crate) origin: Origin,
    pub(crate) generation: u32,
    pub(crate) scale: Option<Arc<dyn Scale>>,
}

impl NoteRequest {
    /// A top-level pattern note starting at the beginning of the period, with
    /// its length taken from the track's beat length.
    pub fn new(track: Arc<dyn Track>, note: Note) -> NoteRequest {
        NoteRequest {
            track,
            note,
            offset: 0,
            frames: 0,
            parent: None,
            midi_channel: None,
            origin: Origin::Pattern,
            generation: 0,
            scale: None,
        }
    }

    /// A sub-note of `parent` with the parent's timing, channel and scale, one
    /// generation further down.
    pub fn sub_note(parent: &NoteEvent, note: Note, origin: Origin) -> NoteRequest {
        NoteRequest {
            track: Arc::clone(parent.track()),
            note,
            offset: parent.offset(),
            frames: parent.timing().frames(),
            parent: Some(parent.id()),
            midi_channel: Some(parent.midi_channel()),
            origin,
            generation: parent.generation() + 1,
            scale: parent.scale_override.clone(),
        }
    }

    /// Start of the note relative to the current period. Offsets past the end
    /// of the period start the note in a later period.
    pub fn offset(mut self, offset: Frames) -> NoteRequest {
        self.offset = offset;
        self
    }

    /// Scheduled length in frames. Zero uses the track's beat length.
    pub fn frames(mut self, frames: Frames) -> NoteRequest {
        self.frames = frames;
        self
    }

    pub fn parent(mut self, parent: NoteId) -> NoteRequest {
        self.parent = Some(parent);
        self
    }

    pub fn midi_channel(mut self, channel: u8) -> NoteRequest {
        self.midi_channel = Some(channel);
        self
    }

    pub fn origin(mut self, origin: Origin) -> NoteRequest {
        self.origin = origin;
        self
    }

    pub fn generation(mut self, generation: u32) -> NoteRequest {
        self.generation = generation;
        self
    }

    /// Plays the note on a different scale than the track's.
    pub fn scale(mut self, scale: Arc<dyn Scale>) -> NoteRequest {
        self.scale = Some(scale);
        self
    }
}

/// A note created off the render thread, waiting to be collected.
pub(crate) struct Spawned {
    pub(crate) id: NoteId,
    pub(crate) request: NoteRequest,
}

/// Hands new notes to the render thread. Cheap to clone, one per producer.
#[derive(Clone)]
pub struct NoteSpawner {
    tx: Sender<Spawned>,
}

impl NoteSpawner {
    pub(crate) fn new(tx: Sender<Spawned>) -> NoteSpawner {
        NoteSpawner { tx }
    }

    /// Reserves an identity for the note and queues it. The note becomes
    /// visible to the manager once the render thread collects it.
    pub fn acquire(&self, request: NoteRequest) -> Result<NoteId, SpawnError> {
        let id = NoteId::next();
        let key = request.note.key();
        self.tx
            .send(Spawned { id, request })
            .map_err(|_| SpawnError::Disconnected)?;
        debug!(note = %id, key, "Note queued for render thread");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::mock::MockTrack;

    #[test]
    fn test_spawn_after_disconnect() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let spawner = NoteSpawner::new(tx);
        let track = Arc::new(MockTrack::new(1));

        assert!(spawner
            .acquire(NoteRequest::new(track.clone(), Note::new(60)))
            .is_ok());
        assert_eq!(rx.len(), 1);

        drop(rx);
        assert_eq!(
            spawner
                .acquire(NoteRequest::new(track, Note::new(60)))
                .err(),
            Some(SpawnError::Disconnected)
        );
    }
}
