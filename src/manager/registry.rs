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
use std::collections::HashSet;

use parking_lot::Mutex;

use crate::event::NoteId;

/// The set of note identities that have already been torn down. Guards the
/// first phase of a release so it runs at most once per note.
#[derive(Debug, Default)]
pub struct ReleaseRegistry {
    released: Mutex<HashSet<NoteId>>,
}

impl ReleaseRegistry {
    pub fn with_capacity(capacity: usize) -> ReleaseRegistry {
        ReleaseRegistry {
            released: Mutex::new(HashSet::with_capacity(capacity)),
        }
    }

    pub fn contains(&self, id: NoteId) -> bool {
        self.released.lock().contains(&id)
    }

    /// Records the note as released. Returns false if it already was.
    pub fn mark_released(&self, id: NoteId) -> bool {
        self.released.lock().insert(id)
    }

    pub fn len(&self) -> usize {
        self.released.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.released.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_released_once() {
        let registry = ReleaseRegistry::with_capacity(4);
        let id = NoteId::next();
        assert!(!registry.contains(id));
        assert!(registry.mark_released(id));
        assert!(!registry.mark_released(id));
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registries_are_independent() {
        let first = ReleaseRegistry::default();
        let second = ReleaseRegistry::default();
        let id = NoteId::next();
        first.mark_released(id);
        assert!(second.is_empty());
        assert!(second.mark_released(id));
    }
}
