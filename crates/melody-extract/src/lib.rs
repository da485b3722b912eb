pub mod note;
pub mod pitch;
pub mod quantize;
pub mod segment;

pub use note::{melody_duration, Note, PitchFrame, Role, MAX_MELODY_PITCH, MIN_MELODY_PITCH};
pub use pitch::{hz_to_midi, Frames, PitchTracker, TrackerParams};
pub use quantize::{quantize, quantize_time, DegeneratePolicy, QuantizeParams};
pub use segment::{segment, NoteSegmenter, SegmenterParams, TrailingNotePolicy};

/// Errors from melody extraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("audio buffer is empty")]
    EmptyBuffer,

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Track, segment and quantize a mono buffer in one call.
///
/// `tracker.sample_rate` and `segmenter.frame_duration` are taken from
/// `sample_rate` and the tracker hop.
pub fn extract_melody(
    samples: &[f32],
    sample_rate: u32,
    tracker: &TrackerParams,
    segmenter: &SegmenterParams,
    quantizer: &QuantizeParams,
) -> Result<Vec<Note>> {
    if samples.is_empty() {
        return Err(Error::EmptyBuffer);
    }
    let tracker = PitchTracker::new(TrackerParams {
        sample_rate,
        ..tracker.clone()
    })?;
    let segmenter = SegmenterParams {
        frame_duration: tracker.params().hop_seconds(),
        ..segmenter.clone()
    };
    let notes = segment(tracker.frames(samples), &segmenter)?;
    quantize(&notes, quantizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_rejected() {
        let err = extract_melody(
            &[],
            44100,
            &TrackerParams::default(),
            &SegmenterParams::default(),
            &QuantizeParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::EmptyBuffer));
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let err = extract_melody(
            &[0.0; 1024],
            0,
            &TrackerParams::default(),
            &SegmenterParams::default(),
            &QuantizeParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSampleRate(0)));
    }

    #[test]
    fn widened_pitch_window_is_rejected() {
        let err = extract_melody(
            &[0.0; 1024],
            44100,
            &TrackerParams::default(),
            &SegmenterParams {
                min_pitch: 0,
                max_pitch: 127,
                ..Default::default()
            },
            &QuantizeParams::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParams(_)));
    }

    #[test]
    fn sine_becomes_quantized_note() {
        let samples: Vec<f32> = (0..44100)
            .map(|i| 0.5 * (std::f32::consts::TAU * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let notes = extract_melody(
            &samples,
            44100,
            &TrackerParams::default(),
            &SegmenterParams::default(),
            &QuantizeParams::default(),
        )
        .unwrap();
        assert_eq!(notes, vec![Note::melody(69, 0.0, 1.0)]);
    }
}
