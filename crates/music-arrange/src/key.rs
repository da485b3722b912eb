use melody_extract::Note;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{KeyMode, KeySignature};

/// Krumhansl-Kessler major key profile (listener tone-fit ratings).
const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile.
const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

const NOTE_NAMES_SHARP: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
const NOTE_NAMES_FLAT: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];

/// Pitch classes conventionally spelled with flats.
const FLAT_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10]; // Db, Eb, F, Gb, Ab, Bb

/// Histogram weighting for key detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyParams {
    /// Weight pitch classes by note duration instead of counting notes.
    pub weight_by_duration: bool,
}

/// Detect the key of a melody using the Krumhansl-Schmuckler algorithm.
///
/// Builds a pitch-class histogram and correlates it against all 24
/// major/minor key profiles. Ties keep the first candidate in
/// C-major, C-minor, C#-major, ... order.
pub fn detect_key(notes: &[Note], params: &KeyParams) -> KeySignature {
    let mut histogram = [0.0_f64; 12];
    for note in notes {
        let weight = if params.weight_by_duration {
            note.duration().max(0.0)
        } else {
            1.0
        };
        histogram[note.pitch_class() as usize] += weight;
    }

    let total: f64 = histogram.iter().sum();
    if total == 0.0 {
        return KeySignature::default();
    }

    for h in &mut histogram {
        *h /= total;
    }

    let mut best_root: u8 = 0;
    let mut best_mode = KeyMode::Major;
    let mut best_corr = f64::NEG_INFINITY;

    for root in 0..12u8 {
        // Rotate histogram so root = index 0
        let mut rotated = [0.0; 12];
        for (i, slot) in rotated.iter_mut().enumerate() {
            *slot = histogram[(i + root as usize) % 12];
        }

        let major_corr = pearson(&rotated, &MAJOR_PROFILE);
        if major_corr > best_corr {
            best_corr = major_corr;
            best_root = root;
            best_mode = KeyMode::Major;
        }

        let minor_corr = pearson(&rotated, &MINOR_PROFILE);
        if minor_corr > best_corr {
            best_corr = minor_corr;
            best_root = root;
            best_mode = KeyMode::Minor;
        }
    }

    let tonic = if FLAT_ROOTS.contains(&best_root) {
        NOTE_NAMES_FLAT[best_root as usize]
    } else {
        NOTE_NAMES_SHARP[best_root as usize]
    };

    debug!(notes = notes.len(), tonic, mode = %best_mode, score = best_corr, "detected key");

    KeySignature {
        tonic: tonic.to_string(),
        tonic_pitch_class: best_root,
        mode: best_mode,
        score: (best_corr * 10000.0).round() / 10000.0,
    }
}

/// Pearson correlation coefficient between two 12-element arrays.
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for (xi, yi) in x.iter().zip(y) {
        let xd = xi - x_mean;
        let yd = yi - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale(pitches: &[u8], seconds_each: f64) -> Vec<Note> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| Note::melody(p, i as f64 * seconds_each, (i + 1) as f64 * seconds_each))
            .collect()
    }

    #[test]
    fn empty_notes_returns_c_major() {
        let result = detect_key(&[], &KeyParams::default());
        assert_eq!(result.tonic, "C");
        assert_eq!(result.mode, KeyMode::Major);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.to_string(), "C major");
    }

    #[test]
    fn c_major_scale_detected() {
        let notes = scale(&[60, 62, 64, 65, 67, 69, 71, 72], 0.5);
        let result = detect_key(&notes, &KeyParams::default());
        assert_eq!(result.tonic, "C");
        assert_eq!(result.mode, KeyMode::Major);
        assert!(result.score > 0.7, "score {} should be > 0.7", result.score);
    }

    #[test]
    fn a_minor_arpeggio_detected() {
        // A C E A E C A: tonic-heavy minor outline
        let notes = scale(&[57, 60, 64, 69, 64, 60, 57, 57], 0.25);
        let result = detect_key(&notes, &KeyParams::default());
        assert_eq!(result.tonic_pitch_class, 9);
        assert_eq!(result.mode, KeyMode::Minor);
        assert_eq!(result.to_string(), "A minor");
    }

    #[test]
    fn flat_key_spelling() {
        // Db major scale: Db Eb F Gb Ab Bb C
        let notes = scale(&[61, 63, 65, 66, 68, 70, 72, 73], 0.5);
        let result = detect_key(&notes, &KeyParams::default());
        assert_eq!(result.tonic_pitch_class, 1);
        assert_eq!(result.tonic, "Db");
        assert_eq!(result.mode, KeyMode::Major);
    }

    #[test]
    fn duration_weighting_changes_histogram() {
        // One long G among short C-major notes pulls towards G
        let mut notes = scale(&[60, 64, 67, 71, 62, 66], 0.1);
        notes.push(Note::melody(67, 1.0, 5.0));

        let counted = detect_key(&notes, &KeyParams::default());
        let weighted = detect_key(
            &notes,
            &KeyParams {
                weight_by_duration: true,
            },
        );
        assert_ne!(counted.score, weighted.score);
    }

    #[test]
    fn pearson_identical_arrays() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let r = pearson(&a, &a);
        assert!((r - 1.0).abs() < 1e-10, "self-correlation should be 1.0, got {}", r);
    }

    #[test]
    fn pearson_flat_histogram_is_zero() {
        let flat = [1.0 / 12.0; 12];
        assert_eq!(pearson(&flat, &MAJOR_PROFILE), 0.0);
    }
}
