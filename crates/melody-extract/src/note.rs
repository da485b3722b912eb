use serde::{Deserialize, Serialize};

/// Lowest MIDI pitch the segmenter accepts as melody (C2).
pub const MIN_MELODY_PITCH: u8 = 36;
/// Highest MIDI pitch the segmenter accepts as melody (F#6).
pub const MAX_MELODY_PITCH: u8 = 90;

/// Functional layer a note belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Melody,
    Chord,
    Bass,
    Harmony,
}

impl Role {
    /// All roles in export track order.
    pub const ALL: [Role; 4] = [Role::Melody, Role::Chord, Role::Bass, Role::Harmony];

    /// General MIDI program used when exporting this layer.
    pub fn program(&self) -> u8 {
        match self {
            Role::Melody => 0,   // Acoustic Grand Piano
            Role::Chord => 0,    // Acoustic Grand Piano
            Role::Bass => 32,    // Acoustic Bass
            Role::Harmony => 48, // String Ensemble 1
        }
    }

    /// MIDI channel used when exporting this layer.
    pub fn channel(&self) -> u8 {
        match self {
            Role::Melody => 0,
            Role::Chord => 1,
            Role::Bass => 2,
            Role::Harmony => 3,
        }
    }

    pub fn track_name(&self) -> &'static str {
        match self {
            Role::Melody => "Melody",
            Role::Chord => "Chords",
            Role::Bass => "Bass",
            Role::Harmony => "Harmony",
        }
    }

    /// RGBA fill color for piano-roll renderers.
    pub fn color(&self) -> [u8; 4] {
        match self {
            Role::Melody => [0, 200, 255, 180],
            Role::Chord => [0, 100, 255, 150],
            Role::Bass => [180, 0, 180, 160],
            Role::Harmony => [255, 80, 200, 160],
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Melody => write!(f, "melody"),
            Role::Chord => write!(f, "chord"),
            Role::Bass => write!(f, "bass"),
            Role::Harmony => write!(f, "harmony"),
        }
    }
}

/// A single pitched note with absolute timing in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub start: f64,
    pub end: f64,
    pub role: Role,
}

impl Note {
    pub fn new(pitch: u8, start: f64, end: f64, role: Role) -> Self {
        Self {
            pitch,
            start,
            end,
            role,
        }
    }

    pub fn melody(pitch: u8, start: f64, end: f64) -> Self {
        Self::new(pitch, start, end, Role::Melody)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }
}

/// One analysis frame of the pitch tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    /// Frame start in seconds (sample index / sample rate)
    pub time: f64,
    /// Fractional MIDI pitch; 0.0 when no pitch was found
    pub pitch: f64,
    /// Estimator reliability (0.0–1.0)
    pub confidence: f64,
}

/// Length of a melody for display: the last note's end, or 1.0 when empty.
pub fn melody_duration(notes: &[Note]) -> f64 {
    notes.last().map(|n| n.end).unwrap_or(1.0)
}
