//! Rule-based accompaniment layers derived note-by-note from the melody.

use melody_extract::{Error, Note, Result, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::AccompanimentFlags;

/// Semitone offsets of a closed-position major triad.
const MAJOR_TRIAD: [i16; 3] = [0, 4, 7];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccompanimentParams {
    /// Length of each bass note in seconds, must be positive. Default: 0.3.
    pub bass_duration: f64,
    /// Semitones added to the melody pitch for bass. Default: -24.
    pub bass_offset: i16,
    /// Semitones added to the melody pitch for harmony. Default: 12.
    pub harmony_offset: i16,
    /// Octave of the chord root, with C4 = 60. Default: 4.
    pub chord_octave: u8,
}

impl Default for AccompanimentParams {
    fn default() -> Self {
        Self {
            bass_duration: 0.3,
            bass_offset: -24,
            harmony_offset: 12,
            chord_octave: 4,
        }
    }
}

impl AccompanimentParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.bass_duration.is_finite() && self.bass_duration > 0.0) {
            return Err(Error::InvalidParams(format!(
                "bass duration must be positive, got {}",
                self.bass_duration
            )));
        }
        Ok(())
    }
}

fn midi_pitch(value: i16) -> Option<u8> {
    u8::try_from(value).ok().filter(|p| *p <= 127)
}

/// Build the enabled accompaniment layers for `melody`.
///
/// Output is grouped by layer (chords, then bass, then harmony), each layer
/// following melody order. Tones that would leave the MIDI range are skipped,
/// and so is the whole bass layer when `bass_duration` is not positive.
pub fn generate_accompaniment(
    melody: &[Note],
    flags: &AccompanimentFlags,
    params: &AccompanimentParams,
) -> Vec<Note> {
    let mut out = Vec::new();
    let mut skipped = 0usize;

    if flags.chords {
        let octave_base = (params.chord_octave as i16 + 1) * 12;
        for note in melody {
            let root = octave_base + note.pitch_class() as i16;
            for interval in MAJOR_TRIAD {
                match midi_pitch(root + interval) {
                    Some(pitch) => out.push(Note::new(pitch, note.start, note.end, Role::Chord)),
                    None => skipped += 1,
                }
            }
        }
    }

    let bass = flags.bass && params.validate().is_ok();
    if flags.bass && !bass {
        warn!(bass_duration = params.bass_duration, "bass layer skipped");
    }
    if bass {
        for note in melody {
            match midi_pitch(note.pitch as i16 + params.bass_offset) {
                Some(pitch) => out.push(Note::new(
                    pitch,
                    note.start,
                    note.start + params.bass_duration,
                    Role::Bass,
                )),
                None => skipped += 1,
            }
        }
    }

    if flags.harmony {
        for note in melody {
            match midi_pitch(note.pitch as i16 + params.harmony_offset) {
                Some(pitch) => out.push(Note::new(pitch, note.start, note.end, Role::Harmony)),
                None => skipped += 1,
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, "accompaniment tones outside MIDI range were skipped");
    }
    debug!(
        melody = melody.len(),
        accompaniment = out.len(),
        chords = flags.chords,
        bass = flags.bass,
        harmony = flags.harmony,
        "generated accompaniment"
    );
    out
}
