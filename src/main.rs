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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use notesched::engine::thread_priority::{
    configure_render_thread_priority, render_thread_priority,
};
use notesched::engine::PeriodStats;
use notesched::track::mock::MockTrack;
use notesched::{
    Arpeggio, ChordStacking, EngineConfig, Glissando, Note, NoteRequest, PitchEvent, RenderEngine,
    Track,
};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A note lifecycle and scheduling engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Renders a scripted session against a mock track and prints lifecycle statistics.
    Simulate {
        /// The path to the engine config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// How many periods to render.
        #[arg(short, long, default_value_t = 256)]
        periods: u64,
        /// How many notes the sequencer thread schedules.
        #[arg(short, long, default_value_t = 16)]
        notes: u32,
        /// Release tail of the mock track, in frames.
        #[arg(short, long, default_value_t = 512)]
        tail: u64,
        /// Chord intervals stacked on every note. Should be in the form <SEMITONES>,...
        /// For example, 4,7.
        #[arg(long)]
        chord: Option<String>,
        /// Arpeggiate every note with this many frames per step.
        #[arg(long)]
        arpeggio_step: Option<u64>,
        /// Glide every note in from this many cents away.
        #[arg(long)]
        glide_cents: Option<f64>,
        /// Master pitch change sent halfway through, in semitones.
        #[arg(long)]
        master_pitch: Option<i32>,
    },
    /// Prints the effective engine configuration.
    ShowConfig {
        /// The path to the engine config.
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, Box<dyn Error>> {
    Ok(match path {
        Some(path) => EngineConfig::deserialize(path)?,
        None => EngineConfig::default(),
    })
}

fn parse_intervals(intervals: &str) -> Result<Vec<i32>, Box<dyn Error>> {
    intervals
        .split(',')
        .map(|interval| {
            interval
                .trim()
                .parse::<i32>()
                .map_err(|e| format!("invalid interval {}: {}", interval, e).into())
        })
        .collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            periods,
            notes,
            tail,
            chord,
            arpeggio_step,
            glide_cents,
            master_pitch,
        } => {
            let config = load_config(config.as_ref())?;
            let track = Arc::new(
                MockTrack::new(1)
                    .with_channels(config.channels() as usize)
                    .with_release_tail(tail)
                    .with_arpeggio(arpeggio_step.is_some()),
            );

            let mut engine = RenderEngine::new(&config);
            if let Some(chord) = chord {
                engine.add_function(track.id(), Box::new(ChordStacking::new(parse_intervals(&chord)?)));
            }
            if let Some(step) = arpeggio_step {
                engine.add_function(track.id(), Box::new(Arpeggio::new(vec![0, 4, 7, 12], step, 0.5)));
            }
            if let Some(cents) = glide_cents {
                engine.add_function(
                    track.id(),
                    Box::new(Glissando::new(cents, config.frames_per_period() as u64 * 8)),
                );
            }

            // Notes are scheduled from a sequencer thread, like a pattern
            // player or MIDI input would.
            let period = config.frames_per_period() as u64;
            let spawner = engine.spawner();
            let sequencer_track = track.clone();
            let sequencer = thread::Builder::new()
                .name("sequencer".into())
                .spawn(move || {
                    let mut scheduled = 0;
                    for index in 0..u64::from(notes) {
                        let request = NoteRequest::new(
                            sequencer_track.clone(),
                            Note::new(48 + (index % 24) as i32),
                        )
                        .offset(index * period / 2 + index % period)
                        .frames(period * (2 + index % 5));
                        match spawner.acquire(request) {
                            Ok(_) => scheduled += 1,
                            Err(e) => warn!(err = %e, "Failed to schedule note"),
                        }
                    }
                    scheduled
                })?;
            let scheduled = sequencer
                .join()
                .map_err(|_| "sequencer thread panicked")?;

            let notifier = engine.notifier();
            let render = thread::Builder::new().name("render".into()).spawn(move || {
                configure_render_thread_priority(render_thread_priority());
                engine.manager_mut().bind_render_thread();

                let mut output = vec![0.0; engine.period_len()];
                let mut totals = PeriodStats::default();
                let mut peak = 0.0f32;
                for index in 0..periods {
                    if index == periods / 2 {
                        if let Some(pitch) = master_pitch {
                            notifier.notify(PitchEvent::MasterPitchChanged(pitch));
                        }
                    }
                    let stats = engine.render_period(&mut output);
                    totals.collected += stats.collected;
                    totals.played += stats.played;
                    totals.released += stats.released;
                    totals.refused += stats.refused;
                    peak = output.iter().fold(peak, |peak, sample| peak.max(sample.abs()));
                }
                (engine, totals, peak)
            })?;
            let (engine, totals, peak) = render.join().map_err(|_| "render thread panicked")?;

            info!(periods = engine.periods_rendered(), "Simulation finished");
            println!("Notes scheduled: {}", scheduled);
            println!("Notes collected: {}", totals.collected);
            println!("Note plays:      {}", totals.played);
            println!("Notes released:  {}", totals.released);
            println!("Refused:         {}", totals.refused);
            println!("Still live:      {}", engine.manager().len());
            println!("MIDI note-ons:   {}", track.note_ons().len());
            println!("MIDI note-offs:  {}", track.note_offs().len());
            println!("Peak level:      {:.3}", peak);
        }
        Commands::ShowConfig { config } => {
            let config = load_config(config.as_ref())?;
            println!("Sample rate:            {}", config.sample_rate());
            println!("Frames per period:      {}", config.frames_per_period());
            println!("Channels:               {}", config.channels());
            println!("Note capacity:          {}", config.note_capacity());
            println!("Strict thread affinity: {}", config.strict_thread_affinity());
            println!("Tempo:                  {}", config.tempo());
            println!("Ticks per beat:         {}", config.ticks_per_beat());
        }
    }

    Ok(())
}
