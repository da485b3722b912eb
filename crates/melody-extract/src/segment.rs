//! Turn a pitch/confidence time series into discrete melody notes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::note::{Note, PitchFrame, MAX_MELODY_PITCH, MIN_MELODY_PITCH};
use crate::{Error, Result};

/// What to do with a note still sounding when the frames run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingNotePolicy {
    /// Close it where the next frame would have started
    #[default]
    Flush,
    /// Discard it
    Drop,
}

/// Parameters controlling note segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterParams {
    /// Frames must be strictly above this confidence. Default: 0.8.
    pub confidence_threshold: f64,
    /// Lowest accepted rounded pitch, never below 36. Default: 36.
    pub min_pitch: u8,
    /// Highest accepted rounded pitch, never above 90. Default: 90.
    pub max_pitch: u8,
    /// Seconds between consecutive frames, used to close trailing notes.
    pub frame_duration: f64,
    pub trailing: TrailingNotePolicy,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            min_pitch: MIN_MELODY_PITCH,
            max_pitch: MAX_MELODY_PITCH,
            frame_duration: 512.0 / 44100.0,
            trailing: TrailingNotePolicy::Flush,
        }
    }
}

impl SegmenterParams {
    /// The pitch window may narrow the melody range but never widen it.
    pub fn validate(&self) -> Result<()> {
        if self.min_pitch < MIN_MELODY_PITCH
            || self.max_pitch > MAX_MELODY_PITCH
            || self.min_pitch > self.max_pitch
        {
            return Err(Error::InvalidParams(format!(
                "pitch range {}..={} must lie within {}..={}",
                self.min_pitch, self.max_pitch, MIN_MELODY_PITCH, MAX_MELODY_PITCH
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::InvalidParams(format!(
                "confidence threshold {} outside 0..=1",
                self.confidence_threshold
            )));
        }
        if !(self.frame_duration.is_finite() && self.frame_duration > 0.0) {
            return Err(Error::InvalidParams(format!(
                "frame duration must be positive, got {}",
                self.frame_duration
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Idle,
    Active { pitch: u8, start: f64 },
}

/// Streaming two-state segmenter: feed frames in time order with [`push`],
/// then call [`finish`] once.
///
/// [`push`]: NoteSegmenter::push
/// [`finish`]: NoteSegmenter::finish
#[derive(Debug, Clone)]
pub struct NoteSegmenter {
    params: SegmenterParams,
    state: State,
    last_time: Option<f64>,
}

impl NoteSegmenter {
    pub fn new(params: SegmenterParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            state: State::Idle,
            last_time: None,
        })
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Rounded pitch of a frame that passes the confidence and range gate.
    fn gate(&self, frame: &PitchFrame) -> Option<u8> {
        if frame.confidence.is_nan() || frame.confidence <= self.params.confidence_threshold {
            return None;
        }
        if !frame.pitch.is_finite() {
            return None;
        }
        let rounded = frame.pitch.round();
        if rounded < self.params.min_pitch as f64 || rounded > self.params.max_pitch as f64 {
            return None;
        }
        Some(rounded as u8)
    }

    /// Advance by one frame, returning a note if one was closed.
    pub fn push(&mut self, frame: PitchFrame) -> Option<Note> {
        let t = frame.time;
        self.last_time = Some(t);

        match (self.state, self.gate(&frame)) {
            (State::Idle, Some(pitch)) => {
                self.state = State::Active { pitch, start: t };
                None
            }
            (State::Idle, None) => None,
            (State::Active { pitch, .. }, Some(next)) if next == pitch => None,
            (State::Active { pitch, start }, Some(next)) => {
                self.state = State::Active {
                    pitch: next,
                    start: t,
                };
                closed(pitch, start, t)
            }
            (State::Active { pitch, start }, None) => {
                self.state = State::Idle;
                closed(pitch, start, t)
            }
        }
    }

    /// End of stream. Applies the trailing-note policy and resets to idle.
    pub fn finish(&mut self) -> Option<Note> {
        let state = std::mem::replace(&mut self.state, State::Idle);
        let last_time = self.last_time.take();

        match (state, self.params.trailing, last_time) {
            (State::Active { pitch, start }, TrailingNotePolicy::Flush, Some(last)) => {
                closed(pitch, start, last + self.params.frame_duration)
            }
            _ => None,
        }
    }
}

fn closed(pitch: u8, start: f64, end: f64) -> Option<Note> {
    (end > start).then(|| Note::melody(pitch, start, end))
}

/// Segment a whole frame sequence into melody notes.
pub fn segment<I>(frames: I, params: &SegmenterParams) -> Result<Vec<Note>>
where
    I: IntoIterator<Item = PitchFrame>,
{
    let mut segmenter = NoteSegmenter::new(params.clone())?;
    let mut notes = Vec::new();
    let mut frame_count = 0usize;

    for frame in frames {
        frame_count += 1;
        if let Some(note) = segmenter.push(frame) {
            notes.push(note);
        }
    }
    notes.extend(segmenter.finish());

    debug!(frames = frame_count, notes = notes.len(), "segmented melody");
    Ok(notes)
}
