use drumline_domain_eval::{HitOutcome, ScoreSummary};
use drumline_ports::midi::PadHit;
use drumline_ports::storage::SettingsDto;
use drumline_ports::types::Millis;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    Load { path: String },
    Start,
    Pause,
    Stop,
    Seek { ms: Millis },
    /// Seek to a position as shown on screen (visual latency added back).
    SeekDisplay { ms: Millis },
    SetSpeed { multiplier: f64 },
    SetMutedChannels { channels: Vec<u8> },
    SetTrackMuted { track: u16, muted: bool },
    SetLoop { enabled: bool },
    SetRange { start_ms: Millis, end_ms: Millis },
    ClearRange,
    SetReduceArticulations { enabled: bool },
    SetVisualLatency { ms: Millis },
    SetInputOffset { ms: Millis },
    SelectTrack { channel: u8, track: u16 },
    Hit(PadHit),
    Clean,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    SongLoaded {
        title: Option<String>,
        length_ms: Millis,
        lanes: usize,
        measures: usize,
    },
    LoadFailed { message: String },
    PlaybackStateChanged { playing: bool },
    /// `clean_reset` is set when every note went back to pending and strays were dropped.
    LaneStateChanged { lane: usize, clean_reset: bool },
    InputReceived {
        lane: usize,
        time_ms: Millis,
        outcome: HitOutcome,
    },
    SinkError { message: String },
    SettingsUpdated { settings: SettingsDto },
    ScoreUpdated { summary: ScoreSummary },
}

/// Fan-out of discrete events; disconnected subscribers are pruned on publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: Event) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
