//! YIN pitch tracking over fixed-size overlapping windows.
//!
//! Each frame starts `hop` samples after the previous one. The newest `hop`
//! samples of a frame decide whether it is silent; the full `window` starting
//! at the frame is what the estimator sees. A trailing chunk shorter than
//! `hop` never becomes a frame.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::note::PitchFrame;
use crate::{Error, Result};

/// Shortest lag searched, whatever `fmax` is.
const MIN_LAG: usize = 2;

/// Parameters for the pitch tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerParams {
    pub sample_rate: u32,
    /// Analysis window in samples. Default: 2048.
    pub window: usize,
    /// Hop between frames in samples. Default: 512.
    pub hop: usize,
    /// Lowest detectable fundamental in Hz. Default: 60.
    pub fmin: f64,
    /// Highest accepted fundamental in Hz. Estimates above it are reported
    /// unvoiced instead of folding down an octave. Default: 1600.
    pub fmax: f64,
    /// YIN absolute threshold on the normalized difference. Default: 0.15.
    pub yin_threshold: f64,
    /// Hop chunks quieter than this (dB of mean power) are silent. Default: -40.
    pub silence_db: f64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            window: 2048,
            hop: 512,
            fmin: 60.0,
            fmax: 1600.0,
            yin_threshold: 0.15,
            silence_db: -40.0,
        }
    }
}

impl TrackerParams {
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    /// Seconds covered by one hop.
    pub fn hop_seconds(&self) -> f64 {
        self.hop as f64 / self.sample_rate as f64
    }
}

/// Convert a frequency in Hz to fractional MIDI pitch (A4 = 440 Hz = 69).
pub fn hz_to_midi(frequency: f64) -> f64 {
    if frequency <= 0.0 {
        return 0.0;
    }
    69.0 + 12.0 * (frequency / 440.0).log2()
}

/// Validated pitch tracker. Holds no per-buffer state.
#[derive(Debug, Clone)]
pub struct PitchTracker {
    params: TrackerParams,
    max_lag: usize,
}

impl PitchTracker {
    pub fn new(params: TrackerParams) -> Result<Self> {
        if params.sample_rate == 0 {
            return Err(Error::InvalidSampleRate(params.sample_rate));
        }
        if params.window == 0 || params.hop == 0 || params.hop > params.window {
            return Err(Error::InvalidParams(format!(
                "window {} / hop {} must satisfy 0 < hop <= window",
                params.window, params.hop
            )));
        }
        if !(params.fmin > 0.0 && params.fmin < params.fmax) {
            return Err(Error::InvalidParams(format!(
                "frequency range {}..{} Hz is empty",
                params.fmin, params.fmax
            )));
        }

        let sr = params.sample_rate as f64;
        let half = params.window / 2;
        let max_lag = ((sr / params.fmin).ceil() as usize).min(half.saturating_sub(1));

        if max_lag <= MIN_LAG + 2 {
            return Err(Error::InvalidParams(format!(
                "window {} too short for {} Hz at {} Hz sample rate",
                params.window, params.fmin, params.sample_rate
            )));
        }

        debug!(
            sample_rate = params.sample_rate,
            window = params.window,
            hop = params.hop,
            max_lag,
            "pitch tracker ready"
        );

        Ok(Self { params, max_lag })
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    /// Number of frames a buffer of `len` samples yields.
    pub fn frame_count(&self, len: usize) -> usize {
        len / self.params.hop
    }

    /// Lazily analyze `samples`. Calling again restarts from the first frame.
    pub fn frames<'a>(&'a self, samples: &'a [f32]) -> Frames<'a> {
        Frames {
            tracker: self,
            samples,
            next_frame: 0,
            window: vec![0.0; self.params.window],
            diff: vec![0.0; self.max_lag + 1],
            cmnd: vec![1.0; self.max_lag + 1],
        }
    }

    /// Eagerly analyze a whole buffer.
    pub fn track(&self, samples: &[f32]) -> Vec<PitchFrame> {
        self.frames(samples).collect()
    }
}

/// Iterator over the pitch frames of one buffer.
pub struct Frames<'a> {
    tracker: &'a PitchTracker,
    samples: &'a [f32],
    next_frame: usize,
    window: Vec<f64>,
    diff: Vec<f64>,
    cmnd: Vec<f64>,
}

impl Frames<'_> {
    fn analyze(&mut self, start: usize) -> (f64, f64) {
        let tracker = self.tracker;
        let samples = self.samples;
        let params = &tracker.params;
        let chunk = &samples[start..start + params.hop];

        let power = chunk.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / chunk.len() as f64;
        if power <= 0.0 || 10.0 * power.log10() < params.silence_db {
            return (0.0, 0.0);
        }

        for (j, slot) in self.window.iter_mut().enumerate() {
            *slot = samples.get(start + j).copied().unwrap_or(0.0) as f64;
        }

        let max_lag = tracker.max_lag;
        let half = params.window / 2;

        // Difference function
        for lag in 1..=max_lag {
            let mut sum = 0.0;
            for j in 0..half {
                let delta = self.window[j] - self.window[j + lag];
                sum += delta * delta;
            }
            self.diff[lag] = sum;
        }

        // Cumulative mean normalized difference
        self.cmnd[0] = 1.0;
        let mut running = 0.0;
        for lag in 1..=max_lag {
            running += self.diff[lag];
            self.cmnd[lag] = if running > 0.0 {
                self.diff[lag] * lag as f64 / running
            } else {
                1.0
            };
        }

        // The search always starts at MIN_LAG so a tone above fmax lands on
        // its own period, not on a multiple of it.
        let lag = match (MIN_LAG..max_lag).find(|&lag| self.cmnd[lag] < params.yin_threshold) {
            Some(mut lag) => {
                // Walk down to the bottom of the first dip
                while lag + 1 < max_lag && self.cmnd[lag + 1] < self.cmnd[lag] {
                    lag += 1;
                }
                lag
            }
            None => (MIN_LAG..max_lag)
                .min_by(|&a, &b| self.cmnd[a].total_cmp(&self.cmnd[b]))
                .unwrap_or(MIN_LAG),
        };

        let confidence = (1.0 - self.cmnd[lag]).clamp(0.0, 1.0);
        let refined = parabolic_interpolation(&self.cmnd, lag);
        if refined <= 0.0 || confidence <= 0.0 {
            return (0.0, 0.0);
        }

        let frequency = params.sample_rate as f64 / refined;
        if frequency > params.fmax {
            return (0.0, 0.0);
        }
        (hz_to_midi(frequency), confidence)
    }
}

impl Iterator for Frames<'_> {
    type Item = PitchFrame;

    fn next(&mut self) -> Option<PitchFrame> {
        let hop = self.tracker.params.hop;
        let start = self.next_frame * hop;
        if start + hop > self.samples.len() {
            return None;
        }
        self.next_frame += 1;

        let (pitch, confidence) = self.analyze(start);
        Some(PitchFrame {
            time: start as f64 / self.tracker.params.sample_rate as f64,
            pitch,
            confidence,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .tracker
            .frame_count(self.samples.len())
            .saturating_sub(self.next_frame);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}

/// Sub-sample position of the minimum around `index`.
fn parabolic_interpolation(data: &[f64], index: usize) -> f64 {
    if index == 0 || index + 1 >= data.len() {
        return index as f64;
    }

    let (y1, y2, y3) = (data[index - 1], data[index], data[index + 1]);
    let a = (y1 - 2.0 * y2 + y3) / 2.0;
    if a.abs() < 1e-12 {
        return index as f64;
    }

    let offset = -(y3 - y1) / (4.0 * a);
    if offset.abs() > 1.0 {
        return index as f64;
    }
    index as f64 + offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(frequency: f64, seconds: f64, sample_rate: u32) -> Vec<f32> {
        let n = (seconds * sample_rate as f64) as usize;
        (0..n)
            .map(|i| (0.5 * (2.0 * PI * frequency * i as f64 / sample_rate as f64).sin()) as f32)
            .collect()
    }

    fn tracker() -> PitchTracker {
        PitchTracker::new(TrackerParams::default()).unwrap()
    }

    #[test]
    fn hz_to_midi_reference_points() {
        assert!((hz_to_midi(440.0) - 69.0).abs() < 1e-9);
        assert!((hz_to_midi(261.625_565) - 60.0).abs() < 1e-4);
        assert_eq!(hz_to_midi(0.0), 0.0);
    }

    #[test]
    fn detects_a440() {
        let samples = sine(440.0, 0.5, 44100);
        let frames = tracker().track(&samples);

        let frame = frames[5];
        assert!((frame.pitch - 69.0).abs() < 0.1, "pitch {}", frame.pitch);
        assert!(frame.confidence > 0.9, "confidence {}", frame.confidence);
    }

    #[test]
    fn detects_low_c() {
        let samples = sine(65.406, 0.5, 44100);
        let frames = tracker().track(&samples);

        let frame = frames[3];
        assert!((frame.pitch - 36.0).abs() < 0.3, "pitch {}", frame.pitch);
        assert!(frame.confidence > 0.8, "confidence {}", frame.confidence);
    }

    #[test]
    fn tone_above_fmax_is_unvoiced() {
        // B6, about 1976 Hz: must not come back as B5
        let samples = sine(1975.53, 0.5, 44100);
        let frames = tracker().track(&samples);
        assert!(frames.iter().all(|f| f.confidence == 0.0 && f.pitch == 0.0), "{:?}", frames[5]);
    }

    #[test]
    fn tone_above_default_fmax_tracked_when_range_allows() {
        let t = PitchTracker::new(TrackerParams {
            fmax: 3000.0,
            ..Default::default()
        })
        .unwrap();
        let samples = sine(1975.53, 0.5, 44100);
        let frame = t.track(&samples)[5];
        assert!((frame.pitch - 95.0).abs() < 0.2, "pitch {}", frame.pitch);
        assert!(frame.confidence > 0.9, "confidence {}", frame.confidence);
    }

    #[test]
    fn silence_has_zero_confidence() {
        let samples = vec![0.0f32; 44100];
        for frame in tracker().frames(&samples) {
            assert_eq!(frame.confidence, 0.0);
            assert_eq!(frame.pitch, 0.0);
        }
    }

    #[test]
    fn quiet_signal_is_gated() {
        // Peak 0.001 is roughly -63 dB mean power
        let samples: Vec<f32> = sine(440.0, 0.2, 44100).iter().map(|s| s * 0.002).collect();
        assert!(tracker().frames(&samples).all(|f| f.confidence == 0.0));
    }

    #[test]
    fn trailing_partial_hop_is_discarded() {
        let samples = vec![0.0f32; 512 * 10 + 300];
        let frames = tracker().track(&samples);
        assert_eq!(frames.len(), 10);
        assert_eq!(tracker().frame_count(samples.len()), 10);
    }

    #[test]
    fn buffer_shorter_than_hop_yields_nothing() {
        let samples = vec![0.1f32; 511];
        assert_eq!(tracker().frames(&samples).count(), 0);
    }

    #[test]
    fn frame_times_advance_by_hop() {
        let samples = vec![0.0f32; 44100];
        let frames = tracker().track(&samples);
        assert_eq!(frames[0].time, 0.0);
        assert!((frames[2].time - 1024.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn iteration_is_restartable() {
        let samples = sine(330.0, 0.25, 44100);
        let t = tracker();
        let first: Vec<_> = t.frames(&samples).collect();
        let second: Vec<_> = t.frames(&samples).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn size_hint_is_exact() {
        let samples = vec![0.0f32; 512 * 7];
        let t = tracker();
        let mut frames = t.frames(&samples);
        assert_eq!(frames.len(), 7);
        frames.next();
        assert_eq!(frames.len(), 6);
    }

    #[test]
    fn rejects_invalid_params() {
        let zero_rate = TrackerParams {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(PitchTracker::new(zero_rate), Err(Error::InvalidSampleRate(0))));

        let hop_too_big = TrackerParams {
            hop: 4096,
            ..Default::default()
        };
        assert!(matches!(PitchTracker::new(hop_too_big), Err(Error::InvalidParams(_))));

        let inverted = TrackerParams {
            fmin: 500.0,
            fmax: 100.0,
            ..Default::default()
        };
        assert!(matches!(PitchTracker::new(inverted), Err(Error::InvalidParams(_))));
    }
}
