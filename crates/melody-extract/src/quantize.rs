use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::note::Note;
use crate::{Error, Result};

/// How to treat notes whose end snaps onto (or before) their start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Remove the note
    #[default]
    Drop,
    /// Keep it one grid step long, cut short by the next note's start
    Clamp,
}

/// Parameters for rhythmic quantization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizeParams {
    /// Grid step in seconds. Default: 0.125.
    pub step: f64,
    pub degenerate: DegeneratePolicy,
}

impl Default for QuantizeParams {
    fn default() -> Self {
        Self {
            step: 0.125,
            degenerate: DegeneratePolicy::Drop,
        }
    }
}

impl QuantizeParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(Error::InvalidParams(format!(
                "quantization step must be positive, got {}",
                self.step
            )));
        }
        Ok(())
    }
}

/// Snap `t` to the nearest multiple of `step`, ties to even.
pub fn quantize_time(t: f64, step: f64) -> f64 {
    (t / step).round_ties_even() * step
}

/// Snap every note boundary to the grid.
///
/// Start and end are rounded independently; order, pitch and role are kept.
/// `notes` must be time-ordered and non-overlapping, as the segmenter
/// produces them, and the output stays that way.
pub fn quantize(notes: &[Note], params: &QuantizeParams) -> Result<Vec<Note>> {
    params.validate()?;

    let starts: Vec<f64> = notes.iter().map(|n| quantize_time(n.start, params.step)).collect();
    let mut out = Vec::with_capacity(notes.len());
    let mut degenerate = 0usize;

    for (i, note) in notes.iter().enumerate() {
        let start = starts[i];
        let mut end = quantize_time(note.end, params.step);

        if end <= start {
            degenerate += 1;
            if params.degenerate == DegeneratePolicy::Drop {
                continue;
            }
            end = start + params.step;
            if let Some(&next) = starts.get(i + 1) {
                end = end.min(next);
            }
            // No room before the next note
            if end <= start {
                continue;
            }
        }

        out.push(Note { start, end, ..note.clone() });
    }

    debug!(
        input = notes.len(),
        output = out.len(),
        degenerate,
        step = params.step,
        "quantized notes"
    );
    Ok(out)
}
