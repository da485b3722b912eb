//! Layered configuration loading for humscribe.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins, key by key):
//! 1. `/etc/humscribe/config.toml` (system)
//! 2. `~/.config/humscribe/config.toml` (user)
//! 3. `./humscribe.toml` (local override), or the path given with `--config`
//! 4. Environment variables (`HUMSCRIBE_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [tracker]
//! window = 2048
//! hop = 512
//! silence_db = -40.0
//!
//! [segmenter]
//! confidence_threshold = 0.8
//! trailing = "flush"
//!
//! [quantizer]
//! step = 0.125
//!
//! [accompaniment]
//! harmony = false
//!
//! [export]
//! bpm = 120.0
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{
    AccompanimentConfig, ExportConfig, KeyConfig, LoggingConfig, QuantizerConfig,
    SegmenterConfig, TrackerConfig,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete humscribe configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HumConfig {
    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub segmenter: SegmenterConfig,

    #[serde(default)]
    pub quantizer: QuantizerConfig,

    #[serde(default)]
    pub key: KeyConfig,

    #[serde(default)]
    pub accompaniment: AccompanimentConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HumConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an optional file replacing `./humscribe.toml`.
    ///
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        Self::load_files(&files)
    }

    /// Layer the given files in order, then apply env overrides.
    pub fn load_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in files {
            let table = loader::load_from_file(path)?;
            merged = loader::merge_tables(merged, table);
            sources.files.push(path.clone());
        }

        let label = sources
            .files
            .last()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("<defaults>"));
        let mut config = loader::from_table(merged, &label)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Build TOML manually for stable ordering and comments
        let mut output = String::new();

        output.push_str("# humscribe configuration\n\n");

        output.push_str("[tracker]\n");
        output.push_str(&format!("window = {}\n", self.tracker.window));
        output.push_str(&format!("hop = {}\n", self.tracker.hop));
        output.push_str(&format!("fmin = {:?}\n", self.tracker.fmin));
        output.push_str(&format!("fmax = {:?}\n", self.tracker.fmax));
        output.push_str(&format!("yin_threshold = {:?}\n", self.tracker.yin_threshold));
        output.push_str(&format!("silence_db = {:?}\n", self.tracker.silence_db));

        output.push_str("\n[segmenter]\n");
        output.push_str(&format!(
            "confidence_threshold = {:?}\n",
            self.segmenter.confidence_threshold
        ));
        output.push_str(&format!("min_pitch = {}\n", self.segmenter.min_pitch));
        output.push_str(&format!("max_pitch = {}\n", self.segmenter.max_pitch));
        output.push_str(&format!(
            "trailing = \"{}\"\n",
            match self.segmenter.trailing {
                melody_extract::TrailingNotePolicy::Flush => "flush",
                melody_extract::TrailingNotePolicy::Drop => "drop",
            }
        ));

        output.push_str("\n[quantizer]\n");
        output.push_str(&format!("step = {:?}\n", self.quantizer.step));
        output.push_str(&format!(
            "degenerate = \"{}\"\n",
            match self.quantizer.degenerate {
                melody_extract::DegeneratePolicy::Drop => "drop",
                melody_extract::DegeneratePolicy::Clamp => "clamp",
            }
        ));

        output.push_str("\n[key]\n");
        output.push_str(&format!(
            "weight_by_duration = {}\n",
            self.key.weight_by_duration
        ));

        output.push_str("\n[accompaniment]\n");
        output.push_str(&format!("chords = {}\n", self.accompaniment.chords));
        output.push_str(&format!("bass = {}\n", self.accompaniment.bass));
        output.push_str(&format!("harmony = {}\n", self.accompaniment.harmony));
        output.push_str(&format!(
            "bass_duration = {:?}\n",
            self.accompaniment.bass_duration
        ));
        output.push_str(&format!("bass_offset = {}\n", self.accompaniment.bass_offset));
        output.push_str(&format!(
            "harmony_offset = {}\n",
            self.accompaniment.harmony_offset
        ));
        output.push_str(&format!("chord_octave = {}\n", self.accompaniment.chord_octave));

        output.push_str("\n[export]\n");
        output.push_str(&format!("ppq = {}\n", self.export.ppq));
        output.push_str(&format!("bpm = {:?}\n", self.export.bpm));

        output.push_str("\n[logging]\n");
        output.push_str(&format!("level = \"{}\"\n", self.logging.level));

        output
    }
}
