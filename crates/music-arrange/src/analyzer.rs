use melody_extract::Note;

use crate::accompaniment::{generate_accompaniment, AccompanimentParams};
use crate::key::{detect_key, KeyParams};
use crate::types::{AccompanimentFlags, KeySignature};

/// Backend for the musical-analysis half of the pipeline.
///
/// The pipeline only talks to this trait, so a model-backed analyzer can be
/// swapped in for the heuristics without touching extraction or export.
pub trait MusicAnalyzer: Send + Sync {
    fn analyze_key(&self, melody: &[Note]) -> KeySignature;

    fn accompany(&self, melody: &[Note], flags: &AccompanimentFlags) -> Vec<Note>;
}

/// Krumhansl-Schmuckler key finding plus rule-based triads, bass and harmony.
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer {
    pub key: KeyParams,
    pub accompaniment: AccompanimentParams,
}

impl HeuristicAnalyzer {
    pub fn new(key: KeyParams, accompaniment: AccompanimentParams) -> Self {
        Self { key, accompaniment }
    }
}

impl MusicAnalyzer for HeuristicAnalyzer {
    fn analyze_key(&self, melody: &[Note]) -> KeySignature {
        detect_key(melody, &self.key)
    }

    fn accompany(&self, melody: &[Note], flags: &AccompanimentFlags) -> Vec<Note> {
        generate_accompaniment(melody, flags, &self.accompaniment)
    }
}
