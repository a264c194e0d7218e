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

//! Creation, hierarchy and exactly-once teardown of note events.
//!
//! The manager owns every live [`NoteEvent`] in an arena keyed by [`NoteId`].
//! Parents and sub-notes refer to each other by id only, so anything that
//! cascades through a hierarchy (note-off, mute, finish, resize, frequency
//! updates) is implemented here.
//!
//! Timing state is only mutated from the render thread. Notes created on other
//! threads go through a [`NoteSpawner`] and are collected at the start of a
//! period.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, trace, warn};

use crate::config::EngineConfig;
use crate::engine::Transport;
use crate::error::{NoteError, ReleaseError};
use crate::event::{FrameClock, Frames, NoteEvent, NoteId, PlayHandle};
use crate::note::Origin;
use crate::track::TrackId;

mod registry;
mod spawner;

pub use registry::ReleaseRegistry;
pub use spawner::{NoteRequest, NoteSpawner};

use spawner::Spawned;

/// Length used for notes that play until explicitly released, such as live
/// MIDI input.
pub const UNBOUNDED_FRAMES: Frames = Frames::MAX / 4;

/// Outcome of a [`NoteEventManager::release_finished`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseCount {
    pub released: usize,
    pub refused: usize,
}

/// Owns all live note events.
pub struct NoteEventManager {
    notes: HashMap<NoteId, NoteEvent>,
    /// Live notes in creation order. Sub-notes always follow their parent.
    order: Vec<NoteId>,
    registry: ReleaseRegistry,
    frames_per_period: Frames,
    tempo: f64,
    master_pitch: i32,
    render_thread: Option<ThreadId>,
    strict_thread_affinity: bool,
    spawn_tx: Sender<Spawned>,
    spawn_rx: Receiver<Spawned>,
}

impl NoteEventManager {
    pub fn new(config: &EngineConfig) -> NoteEventManager {
        let (spawn_tx, spawn_rx) = crossbeam_channel::unbounded();
        let capacity = config.note_capacity();
        NoteEventManager {
            notes: HashMap::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            registry: ReleaseRegistry::with_capacity(capacity),
            frames_per_period: config.frames_per_period() as Frames,
            tempo: config.tempo(),
            master_pitch: 0,
            render_thread: None,
            strict_thread_affinity: config.strict_thread_affinity(),
            spawn_tx,
            spawn_rx,
        }
    }

    /// Returns a handle other threads can create notes through.
    pub fn spawner(&self) -> NoteSpawner {
        NoteSpawner::new(self.spawn_tx.clone())
    }

    pub fn frames_per_period(&self) -> Frames {
        self.frames_per_period
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn master_pitch(&self) -> i32 {
        self.master_pitch
    }

    pub fn registry(&self) -> &ReleaseRegistry {
        &self.registry
    }

    /// Declares the calling thread as the render thread.
    pub fn bind_render_thread(&mut self) {
        let current = thread::current().id();
        if self.render_thread.replace(current) != Some(current) {
            debug!(thread = ?current, "Render thread bound");
        }
    }

    pub fn render_thread(&self) -> Option<ThreadId> {
        self.render_thread
    }

    /// True on the bound render thread, or when no thread has been bound yet.
    pub fn is_render_thread(&self) -> bool {
        self.render_thread
            .map_or(true, |render_thread| render_thread == thread::current().id())
    }

    pub fn get(&self, id: NoteId) -> Option<&NoteEvent> {
        self.notes.get(&id)
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.notes.contains_key(&id)
    }

    /// Live notes in creation order.
    pub fn live_notes(&self) -> &[NoteId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn parent(&self, id: NoteId) -> Option<NoteId> {
        self.notes.get(&id).and_then(|event| event.parent)
    }

    pub fn children(&self, id: NoteId) -> &[NoteId] {
        self.notes
            .get(&id)
            .map(|event| event.children.as_slice())
            .unwrap_or(&[])
    }

    /// Creates a note on the render thread.
    pub fn acquire(&mut self, request: NoteRequest) -> Result<NoteId, NoteError> {
        self.insert(NoteId::next(), request)
    }

    /// Moves notes queued by spawners into the arena. Returns how many were added.
    pub fn collect_spawned(&mut self) -> usize {
        let mut collected = 0;
        while let Ok(Spawned { id, request }) = self.spawn_rx.try_recv() {
            match self.insert(id, request) {
                Ok(_) => collected += 1,
                Err(e) => warn!(note = %id, err = %e, "Dropping spawned note"),
            }
        }
        collected
    }

    fn insert(&mut self, id: NoteId, request: NoteRequest) -> Result<NoteId, NoteError> {
        if let Some(parent) = request.parent {
            if !self.notes.contains_key(&parent) {
                warn!(note = %id, parent = %parent, "Parent of new note is not live");
                return Err(NoteError::UnknownParent(parent));
            }
        }

        let NoteRequest {
            track,
            note,
            offset,
            frames,
            parent,
            midi_channel,
            origin,
            generation,
            scale,
        } = request;

        let frames = if frames == 0 {
            track.beat_length_frames()
        } else {
            frames
        };
        let clock = FrameClock::new(self.frames_per_period, offset, frames, self.tempo);
        let mut event = NoteEvent::new(
            id,
            Arc::clone(&track),
            note,
            clock,
            parent,
            midi_channel,
            origin,
            generation,
        );
        event.scale_override = scale;
        event.update_frequency(self.master_pitch);

        match parent {
            Some(parent) => {
                if let Some(parent_event) = self.notes.get_mut(&parent) {
                    parent_event.children.push(id);
                    parent_event.master = true;
                }
            }
            None => track.attach_note(id),
        }

        debug!(
            note = %id,
            track = %track.id(),
            key = event.note.key(),
            offset,
            frames,
            parent = ?parent,
            origin = ?origin,
            "Note acquired"
        );

        self.notes.insert(id, event);
        self.order.push(id);
        Ok(id)
    }

    /// Marks a note as a master note. Used by instrument functions that take
    /// over rendering before any sub-note exists.
    pub fn set_master(&mut self, id: NoteId) {
        if let Some(event) = self.notes.get_mut(&id) {
            event.master = true;
        }
    }

    /// Prepares a note for the coming period: clears effect detune and samples
    /// the detune automation at the transport position.
    pub fn begin_period(&mut self, id: NoteId, transport: &Transport) {
        if let Some(event) = self.notes.get_mut(&id) {
            event.begin_period(transport);
        }
    }

    /// Adds an effect detune contribution for the current period.
    pub fn add_effect_detune(&mut self, id: NoteId, cents: f64) {
        if let Some(event) = self.notes.get_mut(&id) {
            event.pitch.add_effect_detune(cents);
        }
    }

    /// Renders one period of a note into `buffer`.
    pub fn play(&mut self, id: NoteId, buffer: &mut [f32]) -> Result<(), NoteError> {
        let event = self.notes.get_mut(&id).ok_or(NoteError::UnknownNote(id))?;

        if event.clock.defer_start() {
            trace!(note = %id, offset = event.clock.offset(), "Note starts in a later period");
            return Ok(());
        }

        let track = Arc::clone(&event.track);
        let pedal_held = track.sustain_pedal_held();
        let muted = event.clock.is_muted();

        if !muted && !event.clock.has_started() {
            let offset = event.clock.offset();
            event.send_note_on(offset);
        }

        if !pedal_held {
            if let Some(release_at) = event.clock.inferred_release() {
                self.release_at(id, release_at);
            }
        }

        if self.notes.get(&id).is_some_and(|event| event.pitch.is_dirty()) {
            self.update_frequency(id);
        }

        let event = self.notes.get_mut(&id).ok_or(NoteError::UnknownNote(id))?;

        // Covers releases deferred by the sustain pedal and releases issued
        // before the note started.
        let release_offset = event.clock.frames_before_release();
        if event.clock.is_released() && !pedal_held && release_offset < self.frames_per_period {
            event.send_note_off(release_offset);
        }

        if !muted && !event.master && !track.is_single_streamed() && event.frames_left() > 0 {
            track.play_note(event, buffer);
        }

        let has_children = event.has_children();
        event.clock.advance(pedal_held, has_children);
        Ok(())
    }

    /// Releases a note at `offset` frames into the current period.
    pub fn note_off(&mut self, id: NoteId, offset: Frames) -> Result<(), NoteError> {
        if !self.notes.contains_key(&id) {
            return Err(NoteError::UnknownNote(id));
        }
        if offset >= self.frames_per_period {
            warn!(
                note = %id,
                offset,
                period = self.frames_per_period,
                "Note-off offset outside of the current period"
            );
            return Err(NoteError::OffsetOutOfRange {
                id,
                offset,
                period: self.frames_per_period,
            });
        }

        self.release_at(id, offset);
        Ok(())
    }

    /// Note-off without range checks. Sub-notes are released before their parent.
    fn release_at(&mut self, id: NoteId, offset: Frames) {
        let Some(event) = self.notes.get_mut(&id) else {
            return;
        };
        if event.clock.is_released() {
            return;
        }
        // Mark first so the cascade never comes back here.
        event.clock.begin_release(offset, 0, false);

        let mut index = 0;
        while let Some(child) = self.notes.get(&id).and_then(|e| e.children.get(index).copied()) {
            self.release_at(child, offset);
            index += 1;
        }

        let Some(event) = self.notes.get_mut(&id) else {
            return;
        };
        let track = Arc::clone(&event.track);
        let has_children = event.has_children();
        event
            .clock
            .begin_release(offset, track.release_tail_frames(), has_children);

        if !track.sustain_pedal_held() {
            event.send_note_off(offset);
        }

        debug!(
            note = %id,
            offset,
            release_frames = event.clock.release_frames_to_do(),
            "Note released"
        );
    }

    /// True once the note and its whole sub-tree have nothing left to play, or
    /// it or an ancestor was force-finished. Notes already torn down count as
    /// finished.
    pub fn is_finished(&self, id: NoteId) -> bool {
        match self.notes.get(&id) {
            Some(event) => self.finished_from_above(event) || self.settled(event),
            None => self.registry.contains(id),
        }
    }

    fn finished_from_above(&self, event: &NoteEvent) -> bool {
        event.clock.is_marked_finished()
            || event
                .parent
                .and_then(|parent| self.notes.get(&parent))
                .is_some_and(|parent| self.finished_from_above(parent))
    }

    fn settled(&self, event: &NoteEvent) -> bool {
        event.clock.is_marked_finished()
            || (event.is_done_playing()
                && event
                    .children
                    .iter()
                    .filter_map(|child| self.notes.get(child))
                    .all(|child| self.settled(child)))
    }

    pub fn frames_left(&self, id: NoteId) -> Option<Frames> {
        self.notes.get(&id).map(|event| event.frames_left())
    }

    pub fn frames_left_for_current_period(&self, id: NoteId) -> Option<Frames> {
        self.notes
            .get(&id)
            .map(|event| event.frames_left_for_current_period())
    }

    /// Force-finishes a note and its whole sub-tree.
    pub fn set_finished(&mut self, id: NoteId) {
        let mut index = 0;
        while let Some(child) = self.notes.get(&id).and_then(|e| e.children.get(index).copied()) {
            self.set_finished(child);
            index += 1;
        }

        if let Some(event) = self.notes.get_mut(&id) {
            event.clock.mark_finished();
            debug!(note = %id, "Note finished");
        }
    }

    /// Silences a note and its whole sub-tree. Counters keep running so the
    /// notes still finish.
    pub fn mute(&mut self, id: NoteId) {
        let mut index = 0;
        while let Some(child) = self.notes.get(&id).and_then(|e| e.children.get(index).copied()) {
            self.mute(child);
            index += 1;
        }

        if let Some(event) = self.notes.get_mut(&id) {
            event.clock.mute();
        }
    }

    /// Rescales a note and its sub-tree to a new tempo. Live input notes have
    /// no scheduled length and are left alone.
    pub fn resize(&mut self, id: NoteId, new_tempo: f64) {
        let Some(event) = self.notes.get(&id) else {
            return;
        };
        let follows_input = match event.origin {
            Origin::MidiInput => true,
            Origin::NoteStacking => event
                .parent
                .and_then(|parent| self.notes.get(&parent))
                .is_some_and(|parent| parent.origin == Origin::MidiInput),
            _ => false,
        };
        if follows_input {
            return;
        }

        if let Some(event) = self.notes.get_mut(&id) {
            event.clock.resize(new_tempo);
        }

        let mut index = 0;
        while let Some(child) = self.notes.get(&id).and_then(|e| e.children.get(index).copied()) {
            self.resize(child, new_tempo);
            index += 1;
        }
    }

    /// Rescales every top-level note to a new tempo.
    pub fn set_tempo(&mut self, new_tempo: f64) {
        if new_tempo <= 0.0 || new_tempo == self.tempo {
            return;
        }

        let mut index = 0;
        while let Some(id) = self.order.get(index).copied() {
            if self.parent(id).is_none() {
                self.resize(id, new_tempo);
            }
            index += 1;
        }

        debug!(old = self.tempo, new = new_tempo, "Tempo changed");
        self.tempo = new_tempo;
    }

    /// Recomputes the frequency of a note and its whole sub-tree.
    pub fn update_frequency(&mut self, id: NoteId) {
        let master_pitch = self.master_pitch;
        if let Some(event) = self.notes.get_mut(&id) {
            event.update_frequency(master_pitch);
        }

        let mut index = 0;
        while let Some(child) = self.notes.get(&id).and_then(|e| e.children.get(index).copied()) {
            self.update_frequency(child);
            index += 1;
        }
    }

    pub fn set_master_pitch(&mut self, master_pitch: i32) {
        if self.master_pitch != master_pitch {
            self.master_pitch = master_pitch;
            self.notes
                .values_mut()
                .for_each(|event| event.pitch.mark_dirty());
        }
    }

    /// Marks every note of a track for frequency recomputation.
    pub fn mark_track_dirty(&mut self, track: TrackId) {
        self.notes
            .values_mut()
            .filter(|event| event.track.id() == track)
            .for_each(|event| event.pitch.mark_dirty());
    }

    pub fn mark_all_dirty(&mut self) {
        self.notes
            .values_mut()
            .for_each(|event| event.pitch.mark_dirty());
    }

    /// Tears a finished note down. Must be called on the render thread, after
    /// every sub-note has been released. Violations are logged and the call is
    /// refused; the note stays intact and the call can be retried.
    pub fn release(&mut self, id: NoteId) -> Result<(), ReleaseError> {
        self.free(id)?;
        self.order.retain(|live| *live != id);
        Ok(())
    }

    /// Releases every finished note without live sub-notes in one pass over
    /// the live notes, newest first. Sub-notes always follow their parent in
    /// creation order, so a parent whose sub-notes all finish goes in the
    /// same pass.
    pub fn release_finished(&mut self) -> ReleaseCount {
        let mut count = ReleaseCount::default();
        for index in (0..self.order.len()).rev() {
            let id = self.order[index];
            let Some(event) = self.notes.get(&id) else {
                continue;
            };
            if event.has_children() || !self.is_finished(id) {
                continue;
            }
            match self.free(id) {
                Ok(()) => count.released += 1,
                Err(_) => count.refused += 1,
            }
        }

        if count.released > 0 {
            let notes = &self.notes;
            self.order.retain(|live| notes.contains_key(live));
        }
        count
    }

    /// Checks and tears down a note. Leaves `order` to the caller.
    fn free(&mut self, id: NoteId) -> Result<(), ReleaseError> {
        if !self.is_render_thread() {
            warn!(
                note = %id,
                thread = ?thread::current().id(),
                render_thread = ?self.render_thread,
                "Note released outside of the render thread"
            );
            if self.strict_thread_affinity {
                return Err(ReleaseError::WrongThread(id));
            }
        }

        if self.registry.contains(id) {
            error!(
                note = %id,
                backtrace = %Backtrace::capture(),
                "Refusing to release a note twice"
            );
            return Err(ReleaseError::DoubleRelease(id));
        }

        let Some(event) = self.notes.get(&id) else {
            error!(note = %id, backtrace = %Backtrace::capture(), "Releasing an unknown note");
            return Err(ReleaseError::UnknownNote(id));
        };

        if !self.is_finished(id) {
            error!(
                note = %id,
                frames_left = event.frames_left(),
                backtrace = %Backtrace::capture(),
                "Refusing to release a note that is still playing"
            );
            return Err(ReleaseError::NotFinished(id));
        }

        if event.has_children() {
            let count = event.children.len();
            error!(
                note = %id,
                children = count,
                backtrace = %Backtrace::capture(),
                "Refusing to release a note with live sub-notes"
            );
            return Err(ReleaseError::DanglingChildren { id, count });
        }

        self.done(id)?;

        // Phase 2: the event is dropped here.
        self.notes.remove(&id);
        debug!(note = %id, live = self.notes.len(), "Note freed");
        Ok(())
    }

    /// Phase 1 of a release: detaches all bookkeeping. Runs at most once per note.
    fn done(&mut self, id: NoteId) -> Result<(), ReleaseError> {
        if !self.registry.mark_released(id) {
            error!(
                note = %id,
                backtrace = %Backtrace::capture(),
                "Note teardown already ran"
            );
            return Err(ReleaseError::DoubleRelease(id));
        }

        let Some(event) = self.notes.get_mut(&id) else {
            return Err(ReleaseError::UnknownNote(id));
        };
        event.send_note_off(0);
        let track = Arc::clone(&event.track);

        match event.parent.take() {
            Some(parent) => {
                if let Some(parent_event) = self.notes.get_mut(&parent) {
                    parent_event.children.retain(|child| *child != id);
                }
            }
            None => track.detach_note(id),
        }
        track.delete_note_plugin_data(id);

        if let Some(event) = self.notes.get(&id) {
            if event.parent.is_some() || !event.children.is_empty() {
                error!(
                    note = %id,
                    backtrace = %Backtrace::capture(),
                    "Note still referenced after teardown"
                );
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for NoteEventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteEventManager")
            .field("live_notes", &self.notes.len())
            .field("released", &self.registry.len())
            .field("frames_per_period", &self.frames_per_period)
            .field("tempo", &self.tempo)
            .finish()
    }
}
