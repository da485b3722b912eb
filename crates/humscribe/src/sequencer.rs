//! Note scheduling and timed playback.
//!
//! Playback runs on its own thread and delivers note events to a
//! [`NoteSink`]. The sink stands in for a synth or MIDI port; this crate
//! does no device I/O.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use melody_extract::Note;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Velocity used for scheduled note-ons.
pub const PLAYBACK_VELOCITY: u8 = 100;

/// Longest single sleep while waiting for the next event, so `stop` is prompt.
const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Melody first, then accompaniment in its own layer order.
pub fn merge(melody: &[Note], accompaniment: &[Note]) -> Vec<Note> {
    let mut merged = Vec::with_capacity(melody.len() + accompaniment.len());
    merged.extend_from_slice(melody);
    merged.extend_from_slice(accompaniment);
    merged
}

/// An absolute-time note event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduledEvent {
    NoteOn {
        time: f64,
        channel: u8,
        pitch: u8,
        velocity: u8,
    },
    NoteOff {
        time: f64,
        channel: u8,
        pitch: u8,
    },
}

impl ScheduledEvent {
    /// Seconds from the start of playback.
    pub fn time(&self) -> f64 {
        match self {
            ScheduledEvent::NoteOn { time, .. } | ScheduledEvent::NoteOff { time, .. } => *time,
        }
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self, ScheduledEvent::NoteOff { .. })
    }
}

/// Turn notes into on/off events sorted by time, with offs before ons at
/// equal times. Each note plays on its role's channel.
pub fn schedule(notes: &[Note]) -> Vec<ScheduledEvent> {
    let mut events = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let channel = note.role.channel();
        events.push(ScheduledEvent::NoteOn {
            time: note.start,
            channel,
            pitch: note.pitch,
            velocity: PLAYBACK_VELOCITY,
        });
        events.push(ScheduledEvent::NoteOff {
            time: note.end,
            channel,
            pitch: note.pitch,
        });
    }

    // Stable sort keeps input order among simultaneous events of one kind
    events.sort_by(|a, b| {
        a.time()
            .total_cmp(&b.time())
            .then_with(|| b.is_note_off().cmp(&a.is_note_off()))
    });
    events
}

/// Receiver of note events during playback.
pub trait NoteSink: Send {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8);

    fn note_off(&mut self, channel: u8, pitch: u8);
}

/// Sink that logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink {
    pub events: usize,
}

impl NoteSink for LogSink {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) {
        self.events += 1;
        info!(channel, pitch, velocity, "note on");
    }

    fn note_off(&mut self, channel: u8, pitch: u8) {
        self.events += 1;
        info!(channel, pitch, "note off");
    }
}

/// Handle to a playback thread.
///
/// Dropping the handle stops playback and waits for the thread.
pub struct Player<S: NoteSink + 'static> {
    stop: Arc<AtomicBool>,
    started: Instant,
    thread_handle: Option<JoinHandle<S>>,
}

impl<S: NoteSink + 'static> Player<S> {
    /// Start playing `events` (as produced by [`schedule`]) into `sink`.
    pub fn spawn(events: Vec<ScheduledEvent>, sink: S) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let started = Instant::now();

        info!(events = events.len(), "starting playback");

        let thread_stop = Arc::clone(&stop);
        let thread_handle = thread::Builder::new()
            .name("humscribe-player".to_string())
            .spawn(move || run_playback(events, sink, started, thread_stop))?;

        Ok(Self {
            stop,
            started,
            thread_handle: Some(thread_handle),
        })
    }

    /// Seconds since playback started, for playhead display.
    pub fn position(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn is_finished(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Ask the playback thread to stop. Sounding notes receive a note-off.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Wait for playback to end and take the sink back.
    ///
    /// Returns `None` if the playback thread panicked.
    pub fn join(mut self) -> Option<S> {
        let handle = self.thread_handle.take()?;
        match handle.join() {
            Ok(sink) => Some(sink),
            Err(_) => {
                warn!("playback thread panicked");
                None
            }
        }
    }
}

impl<S: NoteSink + 'static> Drop for Player<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            self.stop();
            let _ = handle.join();
        }
    }
}

fn run_playback<S: NoteSink>(
    events: Vec<ScheduledEvent>,
    mut sink: S,
    started: Instant,
    stop: Arc<AtomicBool>,
) -> S {
    let mut sounding: BTreeSet<(u8, u8)> = BTreeSet::new();
    let mut delivered = 0usize;

    'events: for event in &events {
        let due = started + Duration::from_secs_f64(event.time().max(0.0));
        loop {
            if stop.load(Ordering::Acquire) {
                break 'events;
            }
            let now = Instant::now();
            if now >= due {
                break;
            }
            thread::sleep((due - now).min(WAIT_SLICE));
        }

        match *event {
            ScheduledEvent::NoteOn {
                channel,
                pitch,
                velocity,
                ..
            } => {
                sink.note_on(channel, pitch, velocity);
                sounding.insert((channel, pitch));
            }
            ScheduledEvent::NoteOff { channel, pitch, .. } => {
                sink.note_off(channel, pitch);
                sounding.remove(&(channel, pitch));
            }
        }
        delivered += 1;
    }

    let silenced = sounding.len();
    for (channel, pitch) in sounding {
        sink.note_off(channel, pitch);
    }

    debug!(delivered, silenced, total = events.len(), "playback finished");
    sink
}
