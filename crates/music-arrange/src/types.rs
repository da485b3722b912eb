use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// Best-guess key of a melody. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Tonic name: "C", "Db", "F#", etc.
    pub tonic: String,
    /// Pitch class 0–11 (C=0, C#=1, ...)
    pub tonic_pitch_class: u8,
    pub mode: KeyMode,
    /// Pearson correlation with the best-matching key profile
    pub score: f64,
}

impl Default for KeySignature {
    /// C major with zero score, used when there is nothing to analyze.
    fn default() -> Self {
        Self {
            tonic: "C".into(),
            tonic_pitch_class: 0,
            mode: KeyMode::Major,
            score: 0.0,
        }
    }
}

impl std::fmt::Display for KeySignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

/// Which accompaniment layers to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccompanimentFlags {
    pub chords: bool,
    pub bass: bool,
    pub harmony: bool,
}

impl AccompanimentFlags {
    pub fn none() -> Self {
        Self {
            chords: false,
            bass: false,
            harmony: false,
        }
    }

    pub fn any(&self) -> bool {
        self.chords || self.bass || self.harmony
    }
}

impl Default for AccompanimentFlags {
    fn default() -> Self {
        Self {
            chords: true,
            bass: true,
            harmony: true,
        }
    }
}
