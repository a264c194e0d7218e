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
use crate::config::EngineConfig;
use crate::event::Frames;

/// The song's global position and tempo.
#[derive(Debug, Clone, PartialEq)]
pub struct Transport {
    sample_rate: u32,
    ticks_per_beat: u32,
    tempo: f64,
    position: Frames,
    playing: bool,
}

impl Transport {
    pub fn new(sample_rate: u32, ticks_per_beat: u32, tempo: f64) -> Transport {
        Transport {
            sample_rate: sample_rate.max(1),
            ticks_per_beat: ticks_per_beat.max(1),
            tempo,
            position: 0,
            playing: true,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Transport {
        Transport::new(config.sample_rate(), config.ticks_per_beat(), config.tempo())
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Changes the tempo, keeping the position in ticks.
    pub fn set_tempo(&mut self, tempo: f64) {
        if tempo <= 0.0 {
            return;
        }
        let ticks = self.ticks();
        self.tempo = tempo;
        self.position = self.frames_for_ticks(ticks);
    }

    pub fn frames_per_tick(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / (self.tempo * self.ticks_per_beat as f64)
    }

    pub fn frames_for_ticks(&self, ticks: f64) -> Frames {
        (ticks * self.frames_per_tick()).round().max(0.0) as Frames
    }

    /// Position in frames since the start of the song.
    pub fn position(&self) -> Frames {
        self.position
    }

    /// Position in ticks since the start of the song.
    pub fn ticks(&self) -> f64 {
        self.position as f64 / self.frames_per_tick()
    }

    pub fn seek(&mut self, position: Frames) {
        self.position = position;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub(crate) fn advance(&mut self, frames: Frames) {
        if self.playing {
            self.position += frames;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_follow_tempo() {
        // 120 BPM at 48 ticks per beat and 48 kHz: 500 frames per tick.
        let mut transport = Transport::new(48000, 48, 120.0);
        assert_eq!(transport.frames_per_tick(), 500.0);
        transport.advance(5000);
        assert_eq!(transport.ticks(), 10.0);

        transport.set_tempo(240.0);
        assert_eq!(transport.ticks(), 10.0);
        assert_eq!(transport.position(), 2500);
    }

    #[test]
    fn test_stopped_transport_holds_position() {
        let mut transport = Transport::new(44100, 48, 140.0);
        transport.set_playing(false);
        transport.advance(256);
        assert_eq!(transport.position(), 0);
    }
}
