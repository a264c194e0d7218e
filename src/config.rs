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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

pub mod error;

pub use error::ConfigError;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_FRAMES_PER_PERIOD: usize = 256;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_NOTE_CAPACITY: usize = 512;
const DEFAULT_TEMPO: f64 = 140.0;
const DEFAULT_TICKS_PER_BEAT: u32 = 48;

/// The render engine configuration. Every field is optional in the file.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// Sample rate in Hz (default: 44100).
    sample_rate: Option<u32>,

    /// Frames rendered per period (default: 256).
    frames_per_period: Option<usize>,

    /// Interleaved output channels (default: 2).
    channels: Option<u16>,

    /// Notes the engine can hold before its tables grow (default: 512).
    note_capacity: Option<usize>,

    /// Refuse releases issued outside of the render thread instead of only
    /// logging them (default: false).
    strict_thread_affinity: Option<bool>,

    /// Initial song tempo in BPM (default: 140).
    tempo: Option<f64>,

    /// Resolution of the song timeline (default: 48 ticks per beat).
    ticks_per_beat: Option<u32>,
}

impl EngineConfig {
    /// Parses an engine configuration from a YAML, TOML or JSON file.
    pub fn deserialize(path: &Path) -> Result<EngineConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<EngineConfig>()?)
    }

    pub fn with_frames_per_period(mut self, frames: usize) -> EngineConfig {
        self.frames_per_period = Some(frames);
        self
    }

    pub fn with_tempo(mut self, tempo: f64) -> EngineConfig {
        self.tempo = Some(tempo);
        self
    }

    pub fn with_strict_thread_affinity(mut self, strict: bool) -> EngineConfig {
        self.strict_thread_affinity = Some(strict);
        self
    }

    pub fn with_channels(mut self, channels: u16) -> EngineConfig {
        self.channels = Some(channels);
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE).max(1)
    }

    pub fn frames_per_period(&self) -> usize {
        self.frames_per_period
            .unwrap_or(DEFAULT_FRAMES_PER_PERIOD)
            .max(1)
    }

    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS).max(1)
    }

    pub fn note_capacity(&self) -> usize {
        self.note_capacity.unwrap_or(DEFAULT_NOTE_CAPACITY)
    }

    pub fn strict_thread_affinity(&self) -> bool {
        self.strict_thread_affinity.unwrap_or(false)
    }

    pub fn tempo(&self) -> f64 {
        match self.tempo {
            Some(tempo) if tempo > 0.0 => tempo,
            _ => DEFAULT_TEMPO,
        }
    }

    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_beat.unwrap_or(DEFAULT_TICKS_PER_BEAT).max(1)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use config::FileFormat;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate(), 44100);
        assert_eq!(config.frames_per_period(), 256);
        assert_eq!(config.channels(), 2);
        assert!(!config.strict_thread_affinity());
        assert_eq!(config.tempo(), 140.0);
        assert_eq!(config.ticks_per_beat(), 48);
    }

    #[test]
    fn test_partial_yaml() {
        let config: EngineConfig = Config::builder()
            .add_source(config::File::from_str(
                r#"
                frames_per_period: 64
                strict_thread_affinity: true
                tempo: 0
                "#,
                FileFormat::Yaml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.frames_per_period(), 64);
        assert!(config.strict_thread_affinity());
        // Non-positive tempos fall back to the default.
        assert_eq!(config.tempo(), 140.0);
        assert_eq!(config.sample_rate(), 44100);
    }

    #[test]
    fn test_deserialize_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "sample_rate: 48000\nchannels: 1\nnote_capacity: 16").unwrap();

        let config = EngineConfig::deserialize(file.path()).unwrap();
        assert_eq!(config.sample_rate(), 48000);
        assert_eq!(config.channels(), 1);
        assert_eq!(config.note_capacity(), 16);
    }

    #[test]
    fn test_deserialize_missing_file() {
        let result = EngineConfig::deserialize(Path::new("/nonexistent/notesched.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
