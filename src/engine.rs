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

//! The period loop that drives a [`NoteEventManager`].
//!
//! Each period the engine collects notes spawned on other threads, applies
//! pending pitch changes, runs the instrument functions of every note, renders
//! it into a scratch buffer and mixes that into the output. Afterwards every
//! finished note is released, sub-notes before their parents.

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::event::Frames;
use crate::functions::NoteFunction;
use crate::manager::{NoteEventManager, NoteSpawner};
use crate::track::TrackId;

mod notify;
pub mod thread_priority;
mod transport;

pub use notify::{PitchEvent, PitchNotifier};
pub use transport::Transport;

/// What happened during one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodStats {
    /// Notes moved in from spawners.
    pub collected: usize,
    /// Notes played.
    pub played: usize,
    /// Notes torn down.
    pub released: usize,
    /// Releases the manager refused.
    pub refused: usize,
}

pub struct RenderEngine {
    manager: NoteEventManager,
    transport: Transport,
    functions: HashMap<TrackId, Vec<Box<dyn NoteFunction>>>,
    pitch_tx: Sender<PitchEvent>,
    pitch_rx: Receiver<PitchEvent>,
    channels: usize,
    scratch: Vec<f32>,
    periods: u64,
}

impl RenderEngine {
    pub fn new(config: &EngineConfig) -> RenderEngine {
        let (pitch_tx, pitch_rx) = crossbeam_channel::unbounded();
        let channels = config.channels() as usize;
        RenderEngine {
            manager: NoteEventManager::new(config),
            transport: Transport::from_config(config),
            functions: HashMap::new(),
            pitch_tx,
            pitch_rx,
            channels,
            scratch: vec![0.0; config.frames_per_period() * channels],
            periods: 0,
        }
    }

    pub fn manager(&self) -> &NoteEventManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut NoteEventManager {
        &mut self.manager
    }

    pub fn spawner(&self) -> NoteSpawner {
        self.manager.spawner()
    }

    pub fn notifier(&self) -> PitchNotifier {
        PitchNotifier::new(self.pitch_tx.clone())
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Interleaved samples in one period of output.
    pub fn period_len(&self) -> usize {
        self.scratch.len()
    }

    pub fn periods_rendered(&self) -> u64 {
        self.periods
    }

    /// Attaches an instrument function to every note of a track. Functions run
    /// in the order they were added.
    pub fn add_function(&mut self, track: TrackId, function: Box<dyn NoteFunction>) {
        self.functions.entry(track).or_default().push(function);
    }

    /// Changes the song tempo, rescaling every scheduled note.
    pub fn set_tempo(&mut self, tempo: f64) {
        self.manager.set_tempo(tempo);
        self.transport.set_tempo(tempo);
    }

    pub fn play(&mut self) {
        self.transport.set_playing(true);
    }

    pub fn stop(&mut self) {
        self.transport.set_playing(false);
    }

    /// Renders one period into `output`, which holds interleaved samples.
    pub fn render_period(&mut self, output: &mut [f32]) -> PeriodStats {
        if self.manager.render_thread().is_none() {
            self.manager.bind_render_thread();
        }
        output.fill(0.0);

        let mut stats = PeriodStats {
            collected: self.manager.collect_spawned(),
            ..PeriodStats::default()
        };
        self.apply_pitch_events();

        // Functions may add sub-notes, which land at the end of the order and
        // are played in this same period.
        let mut index = 0;
        while let Some(id) = self.manager.live_notes().get(index).copied() {
            index += 1;
            self.manager.begin_period(id, &self.transport);

            let Some(track) = self.manager.get(id).map(|event| event.track().clone()) else {
                continue;
            };
            if let Some(functions) = self.functions.get(&track.id()) {
                for function in functions {
                    function.process(&mut self.manager, id);
                }
            }

            self.scratch.fill(0.0);
            if let Err(e) = self.manager.play(id, &mut self.scratch) {
                warn!(note = %id, err = %e, "Failed to play note");
                continue;
            }
            stats.played += 1;

            if !track.is_single_streamed() {
                output
                    .iter_mut()
                    .zip(self.scratch.iter())
                    .for_each(|(out, sample)| *out += sample);
            }
        }

        let count = self.manager.release_finished();
        stats.released += count.released;
        stats.refused += count.refused;
        self.transport
            .advance(self.manager.frames_per_period() as Frames);
        self.periods += 1;

        trace!(
            period = self.periods,
            live = self.manager.len(),
            played = stats.played,
            released = stats.released,
            "Period rendered"
        );
        stats
    }

    fn apply_pitch_events(&mut self) {
        while let Ok(event) = self.pitch_rx.try_recv() {
            debug!(event = ?event, "Applying pitch event");
            match event {
                PitchEvent::TrackPitchChanged(track) => self.manager.mark_track_dirty(track),
                PitchEvent::MasterPitchChanged(pitch) => self.manager.set_master_pitch(pitch),
                PitchEvent::TuningChanged => self.manager.mark_all_dirty(),
            }
        }
    }
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("manager", &self.manager)
            .field("transport", &self.transport)
            .field("tracks_with_functions", &self.functions.len())
            .field("channels", &self.channels)
            .field("periods", &self.periods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::error::ReleaseError;
    use crate::event::{HasNote, PlayHandle};
    use crate::functions::{Arpeggio, ChordStacking};
    use crate::manager::NoteRequest;
    use crate::note::Note;
    use crate::scale::{EqualTemperament, Scale, TableScale};
    use crate::testutil::engine_config;
    use crate::track::mock::MockTrack;
    use crate::track::{DetuneCurve, Track as _};

    fn engine(period: usize) -> RenderEngine {
        RenderEngine::new(&engine_config(period))
    }

    fn render(engine: &mut RenderEngine, periods: usize) {
        let mut output = vec![0.0; engine.period_len()];
        for _ in 0..periods {
            engine.render_period(&mut output);
        }
    }

    #[test]
    fn test_notes_are_freed_once_finished() {
        let mut engine = engine(128);
        let track = Arc::new(MockTrack::new(1).with_release_tail(64));
        let id = engine
            .manager_mut()
            .acquire(NoteRequest::new(track.clone(), Note::new(60)).frames(200))
            .unwrap();

        let mut output = vec![0.0; engine.period_len()];
        let mut released = 0;
        for _ in 0..4 {
            released += engine.render_period(&mut output).released;
        }

        assert_eq!(released, 1);
        assert!(!engine.manager().contains(id));
        assert!(engine.manager().is_finished(id));
        // 200 frames plus the 64 frame tail.
        assert_eq!(track.rendered_frames(id), 264);
        assert_eq!(track.deleted(), vec![id]);
        assert_eq!(track.note_offs().len(), 1);
    }

    #[test]
    fn test_output_is_mixed() {
        let mut engine = engine(64);
        let track = Arc::new(MockTrack::new(1));
        for key in [60, 64] {
            engine
                .manager_mut()
                .acquire(NoteRequest::new(track.clone(), Note::new(key)).frames(1000))
                .unwrap();
        }

        let mut output = vec![0.0; engine.period_len()];
        engine.render_period(&mut output);
        // Two notes at the default volume, each rendering a 0.25 level.
        assert!(output.iter().all(|sample| (*sample - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_single_streamed_tracks_are_not_mixed() {
        let mut engine = engine(64);
        let track = Arc::new(MockTrack::new(1).with_single_stream(true));
        let id = engine
            .manager_mut()
            .acquire(NoteRequest::new(track.clone(), Note::new(60)).frames(1000))
            .unwrap();

        let mut output = vec![0.0; engine.period_len()];
        let stats = engine.render_period(&mut output);
        assert_eq!(stats.played, 1);
        assert!(!track.was_rendered(id));
        assert!(output.iter().all(|sample| *sample == 0.0));
    }

    #[test]
    fn test_spawned_notes_are_collected() {
        let mut engine = engine(64);
        let track = Arc::new(MockTrack::new(1));
        let spawner = engine.spawner();

        let id = std::thread::spawn(move || {
            spawner
                .acquire(NoteRequest::new(track, Note::new(60)).frames(100))
                .unwrap()
        })
        .join()
        .unwrap();

        assert!(!engine.manager().contains(id));
        let mut output = vec![0.0; engine.period_len()];
        let stats = engine.render_period(&mut output);
        assert_eq!(stats.collected, 1);
        assert!(engine.manager().contains(id));
    }

    #[test]
    fn test_pitch_events_apply_next_period() {
        let mut engine = engine(64);
        let track = Arc::new(MockTrack::new(1));
        let id = engine
            .manager_mut()
            .acquire(NoteRequest::new(track, Note::new(69)).frames(10_000))
            .unwrap();
        assert_eq!(engine.manager().get(id).unwrap().frequency(), 440.0);

        engine.notifier().notify(PitchEvent::MasterPitchChanged(12));
        assert_eq!(engine.manager().get(id).unwrap().frequency(), 440.0);

        let mut output = vec![0.0; engine.period_len()];
        engine.render_period(&mut output);
        assert_eq!(engine.manager().get(id).unwrap().frequency(), 880.0);
    }

    #[test]
    fn test_hierarchy_is_released_bottom_up() {
        let mut engine = engine(64);
        let track = Arc::new(MockTrack::new(1));
        engine.add_function(
            track.id(),
            Box::new(ChordStacking::new(vec![4, 7])),
        );
        let parent = engine
            .manager_mut()
            .acquire(NoteRequest::new(track.clone(), Note::new(60)).frames(100))
            .unwrap();

        let mut output = vec![0.0; engine.period_len()];
        let stats = engine.render_period(&mut output);
        assert_eq!(stats.played, 3);

        let children = engine.manager().children(parent).to_vec();
        assert_eq!(children.len(), 2);
        let keys: Vec<i32> = children
            .iter()
            .map(|child| engine.manager().get(*child).unwrap().key())
            .collect();
        assert_eq!(keys, vec![64, 67]);

        for _ in 0..16 {
            engine.render_period(&mut output);
        }
        assert!(engine.manager().is_empty());
        let deleted = track.deleted();
        assert_eq!(deleted.len(), 3);
        // The parent goes last.
        assert_eq!(deleted.last(), Some(&parent));
    }

    #[test]
    fn test_tempo_change_rescales_notes() {
        let mut engine = engine(64);
        let track = Arc::new(MockTrack::new(1));
        let id = engine
            .manager_mut()
            .acquire(NoteRequest::new(track, Note::new(60)).frames(1400))
            .unwrap();

        engine.set_tempo(280.0);
        assert_eq!(engine.manager().get(id).unwrap().timing().frames(), 700);
        assert_eq!(engine.transport().tempo(), 280.0);
    }

    #[test]
    fn test_session_tears_everything_down() {
        let mut engine = engine(128);
        let track = Arc::new(MockTrack::new(1).with_release_tail(100));
        engine.add_function(track.id(), Box::new(ChordStacking::new(vec![4, 7])));

        let spawner = engine.spawner();
        let producer_track = track.clone();
        let ids = thread::spawn(move || {
            (0..8)
                .map(|index| {
                    spawner
                        .acquire(
                            NoteRequest::new(producer_track.clone(), Note::new(60 + index))
                                .offset(index as u64 * 90)
                                .frames(300),
                        )
                        .unwrap()
                })
                .collect::<Vec<_>>()
        })
        .join()
        .unwrap();

        render(&mut engine, 40);

        assert!(engine.manager().is_empty());
        // Every root plus two stacked notes each, torn down exactly once.
        let mut deleted = track.deleted();
        assert_eq!(deleted.len(), 24);
        deleted.sort();
        deleted.dedup();
        assert_eq!(deleted.len(), 24);
        assert!(ids.iter().all(|id| deleted.contains(id)));
        assert!(track.attached().is_empty());
        assert_eq!(track.note_ons().len(), 24);
        assert_eq!(track.note_offs().len(), 24);
        assert_eq!(engine.manager().registry().len(), 24);
        for id in ids {
            assert_eq!(
                engine.manager_mut().release(id),
                Err(ReleaseError::DoubleRelease(id))
            );
        }
    }

    #[test]
    fn test_arpeggio_session() {
        let mut engine = engine(100);
        let track = Arc::new(MockTrack::new(2).with_arpeggio(true));
        engine.add_function(track.id(), Box::new(Arpeggio::new(vec![0, 12], 50, 0.5)));

        let root = engine
            .manager_mut()
            .acquire(NoteRequest::new(track.clone(), Note::new(60)).frames(400))
            .unwrap();
        render(&mut engine, 12);

        assert!(engine.manager().is_empty());
        // One step every 50 frames of a 400 frame note; the master itself stays
        // off the MIDI output.
        let ons = track.note_ons();
        assert_eq!(ons.len(), 8);
        assert!(ons.iter().all(|record| record.id != root));
        let keys: Vec<u8> = ons.iter().map(|record| record.key).collect();
        assert_eq!(keys, vec![60, 72, 60, 72, 60, 72, 60, 72]);
        assert_eq!(track.note_offs().len(), 8);
        assert!(!track.was_rendered(root));
    }

    struct Ramp;

    impl DetuneCurve for Ramp {
        fn value_at(&self, ticks: f64) -> f64 {
            if ticks > 0.0 {
                1200.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn test_automation_and_scale_override() {
        let mut engine = engine(64);
        let track = Arc::new(MockTrack::new(3));

        let automated = engine
            .manager_mut()
            .acquire(
                NoteRequest::new(track.clone(), Note::new(69).with_detuning(Arc::new(Ramp)))
                    .frames(10_000),
            )
            .unwrap();
        let quarter_tones = TableScale::new(220.0, vec![0.0, 50.0], 100.0).unwrap();
        let tuned = engine
            .manager_mut()
            .acquire(
                NoteRequest::new(track.clone(), Note::new(59))
                    .frames(10_000)
                    .scale(Arc::new(quarter_tones)),
            )
            .unwrap();

        render(&mut engine, 1);
        let event = engine.manager().get(automated).unwrap();
        assert_eq!(event.frequency(), 440.0);
        assert_eq!(event.key(), 69);
        // Key 2 on a two-degree table with a 100 cent period is one period up.
        let expected = EqualTemperament::default().frequency(1, 0.0);
        assert!((engine.manager().get(tuned).unwrap().frequency() - expected).abs() < 1e-9);

        // The curve reads the transport position, which has moved on.
        render(&mut engine, 1);
        let event = engine.manager().get(automated).unwrap();
        assert_eq!(event.frequency(), 880.0);
        assert_eq!(event.unpitched_frequency(), 440.0);
        assert!(!event.is_released());

        engine.stop();
        engine.transport_mut().seek(0);
        render(&mut engine, 1);
        // A stopped transport leaves the automation where it was.
        assert_eq!(engine.manager().get(automated).unwrap().frequency(), 880.0);
    }
}
