//! humscribe - transcribe a hummed melody and build an accompaniment
//!
//! Subcommands:
//! - `humscribe transcribe <wav>` - Print the detected melody and key
//! - `humscribe export <wav> -o <mid>` - Write melody + accompaniment as MIDI
//! - `humscribe play <wav>` - Schedule playback into a logging sink
//! - `humscribe config` - Show the effective configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use humconf::HumConfig;
use humscribe::{
    audio, schedule, write_midi_file, LogSink, Pipeline, PipelineConfig, Player, Transcription,
};
use music_arrange::AccompanimentFlags;
use tracing::info;

#[derive(Parser)]
#[command(name = "humscribe")]
#[command(about = "Hummed melody transcription with generated accompaniment")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./humscribe.toml)
    #[arg(short, long, global = true, env = "HUMSCRIBE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a WAV file and print the melody
    Transcribe {
        /// Input WAV file
        input: PathBuf,

        /// Print the full transcription as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transcribe, accompany, and write a Standard MIDI File
    Export {
        /// Input WAV file
        input: PathBuf,

        /// Output MIDI file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        layers: LayerArgs,
    },

    /// Transcribe, accompany, and play through the logging sink
    Play {
        /// Input WAV file
        input: PathBuf,

        #[command(flatten)]
        layers: LayerArgs,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Switches that turn accompaniment layers off.
#[derive(Args)]
struct LayerArgs {
    /// Skip the chord layer
    #[arg(long)]
    no_chords: bool,

    /// Skip the bass layer
    #[arg(long)]
    no_bass: bool,

    /// Skip the harmony layer
    #[arg(long)]
    no_harmony: bool,
}

impl LayerArgs {
    fn apply(&self, flags: AccompanimentFlags) -> AccompanimentFlags {
        AccompanimentFlags {
            chords: flags.chords && !self.no_chords,
            bass: flags.bass && !self.no_bass,
            harmony: flags.harmony && !self.no_harmony,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = HumConfig::load_with_sources_from(cli.config.as_deref())
        .context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    for path in &sources.files {
        info!(path = %path.display(), "loaded config file");
    }

    // Shown even when the values would not validate
    if let Commands::Config = cli.command {
        print!("{}", config.to_toml());
        if !sources.env_overrides.is_empty() {
            println!("\n# env overrides: {}", sources.env_overrides.join(", "));
        }
        return Ok(());
    }

    let pipeline =
        Pipeline::new(PipelineConfig::from(&config)).context("invalid configuration")?;

    match cli.command {
        Commands::Transcribe { input, json } => {
            let transcription = transcribe_file(&pipeline, &input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&transcription)?);
            } else {
                print_transcription(&transcription);
            }
        }
        Commands::Export {
            input,
            output,
            layers,
        } => {
            let transcription = transcribe_file(&pipeline, &input)?;
            let flags = layers.apply(pipeline.config().flags);
            let notes = pipeline.arrange(&transcription, &flags);

            let written = write_midi_file(&output, &notes, &pipeline.config().export)
                .with_context(|| format!("failed to write {}", output.display()))?;
            if written {
                println!(
                    "Wrote {} notes ({} melody) to {}",
                    notes.len(),
                    transcription.melody.len(),
                    output.display()
                );
            } else {
                println!("No notes detected; nothing written");
            }
        }
        Commands::Play { input, layers } => {
            let transcription = transcribe_file(&pipeline, &input)?;
            let flags = layers.apply(pipeline.config().flags);
            let notes = pipeline.arrange(&transcription, &flags);

            let player = Player::spawn(schedule(&notes), LogSink::default())
                .context("failed to start playback thread")?;
            match player.join() {
                Some(sink) => println!("Played {} events", sink.events),
                None => anyhow::bail!("playback thread panicked"),
            }
        }
        Commands::Config => {}
    }

    Ok(())
}

fn transcribe_file(pipeline: &Pipeline, input: &Path) -> Result<Transcription> {
    let audio = audio::load_wav(input).with_context(|| format!("failed to read {}", input.display()))?;
    let sample_rate = audio.sample_rate;
    let mono = audio.into_mono();
    pipeline
        .transcribe(&mono, sample_rate)
        .with_context(|| format!("failed to transcribe {}", input.display()))
}

fn print_transcription(transcription: &Transcription) {
    println!("Key: {}", transcription.key);
    println!(
        "Notes: {} over {:.3}s ({} frames)",
        transcription.melody.len(),
        transcription.duration,
        transcription.frame_count
    );
    for note in &transcription.melody {
        println!(
            "  {:>3}  {:>7.3} - {:>7.3}",
            note.pitch, note.start, note.end
        );
    }
}
