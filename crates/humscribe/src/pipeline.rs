//! Batch transcription: samples → pitch frames → notes → quantized melody → key,
//! then accompaniment on request.
//!
//! Nothing is cached between calls. Configuration is passed in and a
//! [`Transcription`] value comes out.

use melody_extract::{
    extract_melody, melody_duration, Note, QuantizeParams, SegmenterParams, TrackerParams,
};
use music_arrange::{
    AccompanimentFlags, AccompanimentParams, HeuristicAnalyzer, KeyParams, KeySignature,
    MusicAnalyzer,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::midi_writer::ExportOptions;
use crate::sequencer::merge;

/// Everything the pipeline needs, resolved from [`humconf::HumConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    /// Sample rate here is replaced by the rate of each input buffer.
    pub tracker: TrackerParams,
    /// Frame duration here is derived from the tracker's hop.
    pub segmenter: SegmenterParams,
    pub quantizer: QuantizeParams,
    pub key: KeyParams,
    pub accompaniment: AccompanimentParams,
    pub flags: AccompanimentFlags,
    pub export: ExportOptions,
}

impl From<&humconf::HumConfig> for PipelineConfig {
    fn from(config: &humconf::HumConfig) -> Self {
        let tracker = &config.tracker;
        let segmenter = &config.segmenter;
        let accompaniment = &config.accompaniment;

        Self {
            tracker: TrackerParams {
                window: tracker.window,
                hop: tracker.hop,
                fmin: tracker.fmin,
                fmax: tracker.fmax,
                yin_threshold: tracker.yin_threshold,
                silence_db: tracker.silence_db,
                ..TrackerParams::default()
            },
            segmenter: SegmenterParams {
                confidence_threshold: segmenter.confidence_threshold,
                min_pitch: segmenter.min_pitch,
                max_pitch: segmenter.max_pitch,
                trailing: segmenter.trailing,
                ..SegmenterParams::default()
            },
            quantizer: QuantizeParams {
                step: config.quantizer.step,
                degenerate: config.quantizer.degenerate,
            },
            key: KeyParams {
                weight_by_duration: config.key.weight_by_duration,
            },
            accompaniment: AccompanimentParams {
                bass_duration: accompaniment.bass_duration,
                bass_offset: accompaniment.bass_offset,
                harmony_offset: accompaniment.harmony_offset,
                chord_octave: accompaniment.chord_octave,
            },
            flags: AccompanimentFlags {
                chords: accompaniment.chords,
                bass: accompaniment.bass,
                harmony: accompaniment.harmony,
            },
            export: ExportOptions::from(&config.export),
        }
    }
}

impl PipelineConfig {
    /// Reject settings that would break melody or accompaniment invariants.
    ///
    /// Tracker settings depend on each buffer's sample rate and are checked
    /// when a buffer is transcribed.
    pub fn validate(&self) -> Result<()> {
        self.segmenter.validate()?;
        self.quantizer.validate()?;
        self.accompaniment.validate()?;
        Ok(())
    }
}

/// Result of transcribing one buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Quantized, time-ordered melody notes
    pub melody: Vec<Note>,
    /// End of the last note, or 1.0 when there are none
    pub duration: f64,
    pub key: KeySignature,
    /// Number of pitch frames analyzed
    pub frame_count: usize,
}

/// Pipeline with an injectable analysis backend.
pub struct Pipeline {
    config: PipelineConfig,
    analyzer: Box<dyn MusicAnalyzer>,
}

impl Pipeline {
    /// Pipeline using the heuristic key detector and accompaniment rules.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let analyzer = HeuristicAnalyzer::new(config.key.clone(), config.accompaniment.clone());
        Self::with_analyzer(config, Box::new(analyzer))
    }

    pub fn with_analyzer(config: PipelineConfig, analyzer: Box<dyn MusicAnalyzer>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, analyzer })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Track, segment and quantize `samples`, then detect the key.
    ///
    /// An empty buffer or zero sample rate is an error. Finding no notes is
    /// not: the result is an empty melody in C major.
    pub fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<Transcription> {
        if samples.is_empty() {
            return Err(Error::InvalidInput("audio buffer is empty".to_string()));
        }
        if sample_rate == 0 {
            return Err(Error::InvalidInput("sample rate must be positive".to_string()));
        }

        let melody = extract_melody(
            samples,
            sample_rate,
            &self.config.tracker,
            &self.config.segmenter,
            &self.config.quantizer,
        )?;
        // hop was validated by the tracker inside extract_melody
        let frame_count = samples.len() / self.config.tracker.hop;
        debug!(notes = melody.len(), frames = frame_count, "melody extracted");

        let key = self.analyzer.analyze_key(&melody);
        let duration = melody_duration(&melody);

        info!(
            samples = samples.len(),
            sample_rate,
            frames = frame_count,
            notes = melody.len(),
            duration,
            key = %key,
            "transcribed melody"
        );

        Ok(Transcription {
            melody,
            duration,
            key,
            frame_count,
        })
    }

    /// Generate the accompaniment layers selected by `flags`.
    pub fn accompany(&self, transcription: &Transcription, flags: &AccompanimentFlags) -> Vec<Note> {
        self.analyzer.accompany(&transcription.melody, flags)
    }

    /// Melody plus accompaniment, ready for playback or export.
    pub fn arrange(&self, transcription: &Transcription, flags: &AccompanimentFlags) -> Vec<Note> {
        let accompaniment = self.accompany(transcription, flags);
        merge(&transcription.melody, &accompaniment)
    }
}

/// Transcribe with the default analyzer.
pub fn transcribe(samples: &[f32], sample_rate: u32, config: &PipelineConfig) -> Result<Transcription> {
    Pipeline::new(config.clone())?.transcribe(samples, sample_rate)
}

/// Accompaniment for a transcription using the heuristic rules.
pub fn accompany(
    transcription: &Transcription,
    flags: &AccompanimentFlags,
    params: &AccompanimentParams,
) -> Vec<Note> {
    music_arrange::generate_accompaniment(&transcription.melody, flags, params)
}

/// Merged melody and accompaniment.
pub fn arrange(
    transcription: &Transcription,
    flags: &AccompanimentFlags,
    params: &AccompanimentParams,
) -> Vec<Note> {
    merge(&transcription.melody, &accompany(transcription, flags, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use melody_extract::Role;

    /// Analyzer that always answers the same key and no accompaniment.
    struct FixedAnalyzer;

    impl MusicAnalyzer for FixedAnalyzer {
        fn analyze_key(&self, _melody: &[Note]) -> KeySignature {
            KeySignature {
                tonic: "F#".to_string(),
                tonic_pitch_class: 6,
                mode: music_arrange::KeyMode::Minor,
                score: 1.0,
            }
        }

        fn accompany(&self, _melody: &[Note], _flags: &AccompanimentFlags) -> Vec<Note> {
            Vec::new()
        }
    }

    fn silence(seconds: f64) -> Vec<f32> {
        vec![0.0; (seconds * 44100.0) as usize]
    }

    #[test]
    fn empty_buffer_is_invalid_input() {
        let err = transcribe(&[], 44100, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn zero_sample_rate_is_invalid_input() {
        let err = transcribe(&[0.0; 4096], 0, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn bad_tracker_params_surface_as_extract_error() {
        let config = PipelineConfig {
            tracker: TrackerParams {
                hop: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = transcribe(&silence(0.5), 44100, &config).unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
    }

    #[test]
    fn widened_pitch_window_is_rejected() {
        let mut config = humconf::HumConfig::default();
        config.segmenter.min_pitch = 0;
        config.segmenter.max_pitch = 127;

        let err = Pipeline::new(PipelineConfig::from(&config)).err().unwrap();
        assert!(matches!(err, Error::Extract(melody_extract::Error::InvalidParams(_))));

        let err = transcribe(&silence(0.5), 44100, &PipelineConfig::from(&config)).unwrap_err();
        assert!(matches!(err, Error::Extract(_)));
    }

    #[test]
    fn non_positive_bass_duration_is_rejected() {
        for bass_duration in [0.0, -1.0] {
            let mut config = humconf::HumConfig::default();
            config.accompaniment.bass_duration = bass_duration;
            let err = Pipeline::new(PipelineConfig::from(&config)).err().unwrap();
            assert!(matches!(err, Error::Extract(melody_extract::Error::InvalidParams(_))));
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(PipelineConfig::from(&humconf::HumConfig::default()).validate().is_ok());
    }

    #[test]
    fn silence_transcribes_to_empty_melody() {
        let result = transcribe(&silence(1.0), 44100, &PipelineConfig::default()).unwrap();
        assert!(result.melody.is_empty());
        assert_eq!(result.duration, 1.0);
        assert_eq!(result.key.to_string(), "C major");
        assert_eq!(result.frame_count, 44100 / 512);
    }

    #[test]
    fn injected_analyzer_is_used() {
        let pipeline =
            Pipeline::with_analyzer(PipelineConfig::default(), Box::new(FixedAnalyzer)).unwrap();
        let result = pipeline.transcribe(&silence(0.5), 44100).unwrap();
        assert_eq!(result.key.to_string(), "F# minor");
        assert!(pipeline.arrange(&result, &AccompanimentFlags::default()).is_empty());
    }

    #[test]
    fn arrange_merges_melody_and_layers() {
        let transcription = Transcription {
            melody: vec![Note::melody(60, 0.0, 0.5)],
            duration: 0.5,
            key: KeySignature::default(),
            frame_count: 0,
        };
        let flags = AccompanimentFlags {
            chords: false,
            bass: true,
            harmony: true,
        };
        let notes = arrange(&transcription, &flags, &AccompanimentParams::default());
        let roles: Vec<Role> = notes.iter().map(|n| n.role).collect();
        assert_eq!(roles, vec![Role::Melody, Role::Bass, Role::Harmony]);

        let none = accompany(&transcription, &AccompanimentFlags::none(), &AccompanimentParams::default());
        assert!(none.is_empty());
    }

    #[test]
    fn config_conversion_carries_values() {
        let mut config = humconf::HumConfig::default();
        config.quantizer.step = 0.25;
        config.accompaniment.harmony = false;
        config.tracker.hop = 256;
        config.export.bpm = 90.0;

        let pipeline = PipelineConfig::from(&config);
        assert_eq!(pipeline.quantizer.step, 0.25);
        assert!(!pipeline.flags.harmony);
        assert_eq!(pipeline.tracker.hop, 256);
        assert_eq!(pipeline.export.bpm, 90.0);
    }
}
