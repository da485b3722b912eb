//! Turn a hummed recording into a melody, a key, and an accompaniment.
//!
//! ```rust,no_run
//! use humscribe::{audio, pipeline::{Pipeline, PipelineConfig}};
//!
//! # fn main() -> humscribe::Result<()> {
//! let audio = audio::load_wav(std::path::Path::new("hum.wav"))?;
//! let sample_rate = audio.sample_rate;
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let transcription = pipeline.transcribe(&audio.into_mono(), sample_rate)?;
//! println!("{} notes in {}", transcription.melody.len(), transcription.key);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod error;
pub mod midi_writer;
pub mod pipeline;
pub mod sequencer;

pub use error::{Error, Result};
pub use midi_writer::{notes_to_midi, write_midi_file, ExportOptions, EXPORT_VELOCITY};
pub use pipeline::{accompany, arrange, transcribe, Pipeline, PipelineConfig, Transcription};
pub use sequencer::{merge, schedule, LogSink, NoteSink, Player, ScheduledEvent};
