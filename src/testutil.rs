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

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::event::NoteId;
use crate::manager::{NoteEventManager, NoteRequest};
use crate::note::Note;
use crate::track::mock::MockTrack;

/// A stereo engine configuration with the given period length.
pub fn engine_config(frames_per_period: usize) -> EngineConfig {
    EngineConfig::default().with_frames_per_period(frames_per_period)
}

pub fn manager(frames_per_period: usize) -> NoteEventManager {
    NoteEventManager::new(&engine_config(frames_per_period))
}

/// Acquires a top-level note of `frames` length on the mock track.
pub fn acquire(
    manager: &mut NoteEventManager,
    track: &Arc<MockTrack>,
    key: i32,
    frames: u64,
) -> NoteId {
    manager
        .acquire(NoteRequest::new(track.clone(), Note::new(key)).frames(frames))
        .expect("acquire note")
}

/// Plays `ids` in order for `periods` periods, like a render loop without
/// teardown.
pub fn play_periods(manager: &mut NoteEventManager, ids: &[NoteId], periods: usize) {
    let mut buffer = vec![0.0; manager.frames_per_period() as usize * 2];
    for _ in 0..periods {
        for id in ids {
            buffer.fill(0.0);
            manager.play(*id, &mut buffer).expect("play note");
        }
    }
}
