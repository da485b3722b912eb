use std::path::Path;

use melody_extract::{Note, Role};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// Velocity written for every note-on. Dynamics are not modeled.
pub const EXPORT_VELOCITY: u8 = 100;

/// Options for MIDI export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Ticks per quarter note. Default: 480.
    pub ppq: u16,
    /// Constant tempo written to the tempo track. Default: 120.
    pub bpm: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            ppq: 480,
            bpm: 120.0,
        }
    }
}

impl From<&humconf::ExportConfig> for ExportOptions {
    fn from(config: &humconf::ExportConfig) -> Self {
        Self {
            ppq: config.ppq,
            bpm: config.bpm,
        }
    }
}

impl ExportOptions {
    /// Convert seconds to ticks at the configured tempo.
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.bpm / 60.0 * self.ppq as f64).round() as u64
    }
}

/// Write role-tagged notes to Standard MIDI File format 1 bytes.
///
/// Track 0: tempo + name. Tracks 1-4: melody, chords, bass, harmony, each
/// with a name and program change even when the layer has no notes.
/// Returns `None` for an empty note list.
pub fn notes_to_midi(notes: &[Note], options: &ExportOptions) -> Option<Vec<u8>> {
    if notes.is_empty() {
        return None;
    }

    let mut tracks: Vec<Vec<u8>> = Vec::with_capacity(1 + Role::ALL.len());
    tracks.push(build_tempo_track(options));

    for role in Role::ALL {
        let layer: Vec<&Note> = notes.iter().filter(|n| n.role == role).collect();
        tracks.push(build_role_track(role, &layer, options));
    }

    Some(build_midi_file(options.ppq, &tracks))
}

/// Export to a file. Returns `false` (and writes nothing) for an empty list.
pub fn write_midi_file(path: &Path, notes: &[Note], options: &ExportOptions) -> Result<bool> {
    let Some(bytes) = notes_to_midi(notes, options) else {
        info!(path = %path.display(), "no notes to export");
        return Ok(false);
    };
    std::fs::write(path, &bytes)?;
    info!(path = %path.display(), notes = notes.len(), bytes = bytes.len(), "wrote MIDI file");
    Ok(true)
}

fn build_tempo_track(options: &ExportOptions) -> Vec<u8> {
    let mut track_data = Vec::new();

    write_vlq(&mut track_data, 0);
    push_track_name(&mut track_data, "humscribe");

    let bpm = if options.bpm > 0.0 { options.bpm } else { 120.0 };
    let usec = (60_000_000.0 / bpm).round().clamp(1.0, 0xFF_FFFF as f64) as u32;
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[
        0xFF,
        0x51,
        0x03,
        (usec >> 16) as u8,
        (usec >> 8) as u8,
        usec as u8,
    ]);

    // End of track
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    track_data
}

fn build_role_track(role: Role, notes: &[&Note], options: &ExportOptions) -> Vec<u8> {
    let channel = role.channel() & 0x0F;
    let mut events: Vec<(u64, Vec<u8>)> = Vec::with_capacity(notes.len() * 2 + 1);

    events.push((0, vec![0xC0 | channel, role.program()]));

    for note in notes {
        let pitch = note.pitch & 0x7F;
        let onset = options.seconds_to_ticks(note.start);
        // Keep a sounding note at least one tick long
        let offset = options.seconds_to_ticks(note.end).max(onset + 1);
        events.push((onset, vec![0x90 | channel, pitch, EXPORT_VELOCITY]));
        events.push((offset, vec![0x80 | channel, pitch, 0]));
    }

    // Sort by tick, with note-offs before note-ons at the same tick
    events.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let a_is_off = a.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            let b_is_off = b.1.first().is_some_and(|b| b & 0xF0 == 0x80);
            b_is_off.cmp(&a_is_off)
        })
    });

    let mut track_data = Vec::new();
    write_vlq(&mut track_data, 0);
    push_track_name(&mut track_data, role.track_name());

    let mut last_tick = 0u64;
    for (tick, data) in events {
        let delta = tick.saturating_sub(last_tick);
        write_vlq(&mut track_data, delta.min(0x0FFF_FFFF) as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }

    // End of track
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    track_data
}

fn push_track_name(buf: &mut Vec<u8>, name: &str) {
    let name_bytes = name.as_bytes();
    buf.extend_from_slice(&[0xFF, 0x03]);
    write_vlq(buf, name_bytes.len() as u32);
    buf.extend_from_slice(name_bytes);
}

/// Assemble a complete MIDI file from track data blobs.
fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    // MThd header
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // format 1
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = [0u8; 5];
    let mut i = bytes.len() - 1;
    bytes[i] = (value & 0x7F) as u8;
    value >>= 7;

    while value > 0 {
        i -= 1;
        bytes[i] = (value & 0x7F) as u8 | 0x80;
        value >>= 7;
    }

    buf.extend_from_slice(&bytes[i..]);
}
