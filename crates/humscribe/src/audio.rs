//! WAV input for the transcription pipeline.
//!
//! Files are fully decoded up front; the pipeline works on an immutable
//! mono snapshot.

use std::io::Cursor;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// Decoded audio as read from the file.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples (L, R, L, R, ...) normalized to [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl DecodedAudio {
    /// Total number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Consume into a mono buffer, averaging channels if needed.
    pub fn into_mono(self) -> Vec<f32> {
        if self.channels <= 1 {
            self.samples
        } else {
            downmix_to_mono(&self.samples, self.channels)
        }
    }
}

/// Decode WAV bytes (integer or float PCM) using hound.
pub fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(data))
        .map_err(|e| Error::Decode(format!("failed to parse WAV header: {e}")))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Decode(format!("failed to read float samples: {e}")))?,
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            if bits == 0 || bits > 32 {
                return Err(Error::Decode(format!("unsupported bit depth: {bits}")));
            }
            let max_val = (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Decode(format!("failed to read int samples: {e}")))?
        }
    };

    debug!(
        samples = samples.len(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        "decoded WAV"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Read and decode a WAV file from disk.
pub fn load_wav(path: &Path) -> Result<DecodedAudio> {
    let data = std::fs::read(path)?;
    decode_wav(&data)
}

/// Average interleaved channels into one.
///
/// A trailing partial frame is ignored.
pub fn downmix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
