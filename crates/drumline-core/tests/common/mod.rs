#![allow(dead_code)]

use drumline_domain_score::{MidiFile, RawTrack, TempoPoint, TimedEvent};
use drumline_ports::midi::{ChannelEvent, ChannelMessage, CC_ALL_NOTES_OFF};
use drumline_ports::sink::{EventSink, SinkError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Sink that keeps every message it is handed, or rejects them all.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<ChannelMessage>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            failing: AtomicBool::new(true),
        }
    }

    pub fn messages(&self) -> Vec<ChannelMessage> {
        self.messages.lock().clone()
    }

    pub fn notes(&self) -> Vec<ChannelMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.event.is_note_on() || m.event.is_note_off())
            .collect()
    }

    pub fn notes_off_count(&self) -> usize {
        self.messages()
            .iter()
            .filter(|m| {
                matches!(
                    m.event,
                    ChannelEvent::ControlChange {
                        controller: CC_ALL_NOTES_OFF,
                        ..
                    }
                )
            })
            .count()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl EventSink for RecordingSink {
    fn send_event(&self, message: ChannelMessage) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::DeviceUnavailable("unplugged".to_string()));
        }
        self.messages.lock().push(message);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

pub fn note_on(channel: u8, note: u8) -> ChannelMessage {
    ChannelMessage::new(channel, ChannelEvent::NoteOn { note, velocity: 100 })
}

pub fn note_off(channel: u8, note: u8) -> ChannelMessage {
    ChannelMessage::new(channel, ChannelEvent::NoteOff { note, velocity: 0 })
}

fn track(name: &str, channel: u8, notes: &[(i64, u8)], duration: i64) -> RawTrack {
    let mut events = Vec::new();
    for &(tick, note) in notes {
        events.push(TimedEvent::channel(tick, note_on(channel, note)));
        events.push(TimedEvent::channel(tick + duration, note_off(channel, note)));
    }
    events.sort_by_key(|event| event.tick);
    RawTrack {
        name: Some(name.to_string()),
        instrument_names: Vec::new(),
        events,
    }
}

/// 500 ticks per quarter at 120 bpm: one tick per millisecond.
///
/// Drums on channel 9: kick at 0, snare at 100. Piano on channel 0 at 100.
/// Every note lasts 50ms, so the song is 150ms long.
pub fn practice_file() -> MidiFile {
    let mut file = MidiFile::new(500);
    file.title = Some("Practice".to_string());
    file.tempo_points.push(TempoPoint {
        tick: 0,
        us_per_quarter: 500_000,
    });
    file.tracks.push(track("Piano", 0, &[(100, 60)], 50));
    file.tracks.push(track("Drums", 9, &[(0, 36), (100, 38)], 50));
    file
}
