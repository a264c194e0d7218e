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
use super::NoteFunction;
use crate::event::{Frames, NoteId, PlayHandle};
use crate::manager::NoteEventManager;

/// Slides a note into pitch from `start_cents` away, linearly over
/// `glide_frames`.
#[derive(Debug, Clone, Copy)]
pub struct Glissando {
    start_cents: f64,
    glide_frames: Frames,
}

impl Glissando {
    pub fn new(start_cents: f64, glide_frames: Frames) -> Glissando {
        Glissando {
            start_cents,
            glide_frames,
        }
    }

    /// Detune at a point of the note timeline.
    pub fn detune_at(&self, played: Frames) -> f64 {
        if played >= self.glide_frames {
            return 0.0;
        }
        self.start_cents * (1.0 - played as f64 / self.glide_frames as f64)
    }
}

impl NoteFunction for Glissando {
    fn process(&self, manager: &mut NoteEventManager, id: NoteId) {
        let Some(played) = manager.get(id).map(|event| event.total_frames_played()) else {
            return;
        };
        manager.add_effect_detune(id, self.detune_at(played));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::Transport;
    use crate::testutil::{acquire, manager};
    use crate::track::mock::MockTrack;

    #[test]
    fn test_glide_converges_on_pitch() {
        let mut manager = manager(100);
        let track = Arc::new(MockTrack::new(1));
        let id = acquire(&mut manager, &track, 69, 1000);
        let transport = Transport::new(44100, 48, 140.0);
        let glissando = Glissando::new(-1200.0, 200);
        let mut buffer = vec![0.0; 200];

        let mut frequencies = Vec::new();
        for _ in 0..3 {
            manager.begin_period(id, &transport);
            glissando.process(&mut manager, id);
            manager.play(id, &mut buffer).unwrap();
            frequencies.push(manager.get(id).unwrap().frequency());
        }

        assert_eq!(frequencies[0], 220.0);
        assert!(frequencies[1] > 220.0 && frequencies[1] < 440.0);
        assert_eq!(frequencies[2], 440.0);
    }

    #[test]
    fn test_zero_glide_is_a_no_op() {
        let glissando = Glissando::new(700.0, 0);
        assert_eq!(glissando.detune_at(0), 0.0);
    }
}
