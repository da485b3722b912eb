//! Config sections, one per pipeline stage.
//!
//! Every field has a serde default so a file only needs the keys it changes.

use melody_extract::{DegeneratePolicy, TrailingNotePolicy};
use serde::{Deserialize, Serialize};

/// Pitch tracker analysis settings. Sample rate comes from the input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Analysis window in samples.
    /// Default: 2048
    #[serde(default = "TrackerConfig::default_window")]
    pub window: usize,

    /// Hop between frames in samples.
    /// Default: 512
    #[serde(default = "TrackerConfig::default_hop")]
    pub hop: usize,

    /// Lowest detectable frequency in Hz.
    /// Default: 60
    #[serde(default = "TrackerConfig::default_fmin")]
    pub fmin: f64,

    /// Highest accepted frequency in Hz. Higher tones read as unvoiced.
    /// Default: 1600
    #[serde(default = "TrackerConfig::default_fmax")]
    pub fmax: f64,

    /// YIN absolute threshold.
    /// Default: 0.15
    #[serde(default = "TrackerConfig::default_yin_threshold")]
    pub yin_threshold: f64,

    /// Frames quieter than this (dB mean power) are unvoiced.
    /// Default: -40
    #[serde(default = "TrackerConfig::default_silence_db")]
    pub silence_db: f64,
}

impl TrackerConfig {
    fn default_window() -> usize {
        2048
    }

    fn default_hop() -> usize {
        512
    }

    fn default_fmin() -> f64 {
        60.0
    }

    fn default_fmax() -> f64 {
        1600.0
    }

    fn default_yin_threshold() -> f64 {
        0.15
    }

    fn default_silence_db() -> f64 {
        -40.0
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window: Self::default_window(),
            hop: Self::default_hop(),
            fmin: Self::default_fmin(),
            fmax: Self::default_fmax(),
            yin_threshold: Self::default_yin_threshold(),
            silence_db: Self::default_silence_db(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Default: 0.8
    #[serde(default = "SegmenterConfig::default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// May narrow the 36..=90 melody range, not widen it.
    /// Default: 36
    #[serde(default = "SegmenterConfig::default_min_pitch")]
    pub min_pitch: u8,

    /// Default: 90
    #[serde(default = "SegmenterConfig::default_max_pitch")]
    pub max_pitch: u8,

    /// "flush" or "drop".
    #[serde(default)]
    pub trailing: TrailingNotePolicy,
}

impl SegmenterConfig {
    fn default_confidence_threshold() -> f64 {
        0.8
    }

    fn default_min_pitch() -> u8 {
        melody_extract::MIN_MELODY_PITCH
    }

    fn default_max_pitch() -> u8 {
        melody_extract::MAX_MELODY_PITCH
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: Self::default_confidence_threshold(),
            min_pitch: Self::default_min_pitch(),
            max_pitch: Self::default_max_pitch(),
            trailing: TrailingNotePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizerConfig {
    /// Grid step in seconds.
    /// Default: 0.125
    #[serde(default = "QuantizerConfig::default_step")]
    pub step: f64,

    /// "drop" or "clamp".
    #[serde(default)]
    pub degenerate: DegeneratePolicy,
}

impl QuantizerConfig {
    fn default_step() -> f64 {
        0.125
    }
}

impl Default for QuantizerConfig {
    fn default() -> Self {
        Self {
            step: Self::default_step(),
            degenerate: DegeneratePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Weight the pitch-class histogram by duration instead of note count.
    #[serde(default)]
    pub weight_by_duration: bool,
}

/// Which layers to generate and how they are voiced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccompanimentConfig {
    #[serde(default = "default_true")]
    pub chords: bool,

    #[serde(default = "default_true")]
    pub bass: bool,

    #[serde(default = "default_true")]
    pub harmony: bool,

    /// Seconds, must be positive.
    /// Default: 0.3
    #[serde(default = "AccompanimentConfig::default_bass_duration")]
    pub bass_duration: f64,

    /// Default: -24
    #[serde(default = "AccompanimentConfig::default_bass_offset")]
    pub bass_offset: i16,

    /// Default: 12
    #[serde(default = "AccompanimentConfig::default_harmony_offset")]
    pub harmony_offset: i16,

    /// Default: 4
    #[serde(default = "AccompanimentConfig::default_chord_octave")]
    pub chord_octave: u8,
}

fn default_true() -> bool {
    true
}

impl AccompanimentConfig {
    fn default_bass_duration() -> f64 {
        0.3
    }

    fn default_bass_offset() -> i16 {
        -24
    }

    fn default_harmony_offset() -> i16 {
        12
    }

    fn default_chord_octave() -> u8 {
        4
    }
}

impl Default for AccompanimentConfig {
    fn default() -> Self {
        Self {
            chords: true,
            bass: true,
            harmony: true,
            bass_duration: Self::default_bass_duration(),
            bass_offset: Self::default_bass_offset(),
            harmony_offset: Self::default_harmony_offset(),
            chord_octave: Self::default_chord_octave(),
        }
    }
}

/// MIDI file export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Ticks per quarter note.
    /// Default: 480
    #[serde(default = "ExportConfig::default_ppq")]
    pub ppq: u16,

    /// Default: 120
    #[serde(default = "ExportConfig::default_bpm")]
    pub bpm: f64,
}

impl ExportConfig {
    fn default_ppq() -> u16 {
        480
    }

    fn default_bpm() -> f64 {
        120.0
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ppq: Self::default_ppq(),
            bpm: Self::default_bpm(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}
