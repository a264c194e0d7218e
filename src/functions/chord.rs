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
use tracing::warn;

use super::NoteFunction;
use crate::event::{HasNote, NoteId, PlayHandle};
use crate::manager::{NoteEventManager, NoteRequest};
use crate::note::{Note, Origin};

/// Stacks a chord on top of every top-level note.
#[derive(Debug, Clone)]
pub struct ChordStacking {
    /// Semitones above the played key.
    intervals: Vec<i32>,
}

impl ChordStacking {
    pub fn new(intervals: Vec<i32>) -> ChordStacking {
        ChordStacking { intervals }
    }

    pub fn intervals(&self) -> &[i32] {
        &self.intervals
    }
}

impl NoteFunction for ChordStacking {
    fn process(&self, manager: &mut NoteEventManager, id: NoteId) {
        let Some(event) = manager.get(id) else {
            return;
        };
        // Only once, on the first period of a note nobody stacked yet.
        if event.parent().is_some()
            || event.origin() == Origin::NoteStacking
            || event.has_children()
            || event.timing().has_started()
            || event.is_released()
        {
            return;
        }

        let requests: Vec<NoteRequest> = self
            .intervals
            .iter()
            .map(|interval| event.key() + interval)
            .filter(|key| Note::is_valid_key(*key))
            .map(|key| NoteRequest::sub_note(event, event.note().with_key(key), Origin::NoteStacking))
            .collect();

        for request in requests {
            if let Err(e) = manager.acquire(request) {
                warn!(note = %id, err = %e, "Failed to stack chord note");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testutil::{acquire, manager, play_periods};
    use crate::track::mock::MockTrack;

    #[test]
    fn test_stacks_once_per_note() {
        let mut manager = manager(64);
        let track = Arc::new(MockTrack::new(1));
        let root = acquire(&mut manager, &track, 60, 500);
        let chord = ChordStacking::new(vec![4, 7]);

        chord.process(&mut manager, root);
        chord.process(&mut manager, root);

        let children = manager.children(root).to_vec();
        assert_eq!(children.len(), 2);
        assert!(manager.get(root).unwrap().is_master());
        for child in &children {
            let event = manager.get(*child).unwrap();
            assert_eq!(event.origin(), Origin::NoteStacking);
            assert_eq!(event.generation(), 1);
            assert_eq!(event.timing().frames(), 500);
            // Sub-notes never stack chords of their own.
            chord.process(&mut manager, *child);
            assert!(manager.children(*child).is_empty());
        }

        // The master stays silent; its sub-notes render.
        play_periods(&mut manager, &[root, children[0], children[1]], 1);
        assert!(!track.was_rendered(root));
        assert!(track.was_rendered(children[0]));
        assert!(track.was_rendered(children[1]));
    }

    #[test]
    fn test_skips_out_of_range_keys() {
        let mut manager = manager(64);
        let track = Arc::new(MockTrack::new(1));
        let root = acquire(&mut manager, &track, 125, 500);

        ChordStacking::new(vec![2, 7]).process(&mut manager, root);
        assert_eq!(manager.children(root).len(), 1);
    }

    #[test]
    fn test_skips_started_notes() {
        let mut manager = manager(64);
        let track = Arc::new(MockTrack::new(1));
        let root = acquire(&mut manager, &track, 60, 500);
        play_periods(&mut manager, &[root], 1);

        ChordStacking::new(vec![4]).process(&mut manager, root);
        assert!(manager.children(root).is_empty());
    }
}
