use drumline_ports::midi::ChannelMessage;
use drumline_ports::types::Tick;
use serde::{Deserialize, Serialize};

pub const DEFAULT_US_PER_QUARTER: u32 = 500_000;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tempo {
    pub us_per_quarter: u32,
}

impl Tempo {
    pub const DEFAULT: Tempo = Tempo {
        us_per_quarter: DEFAULT_US_PER_QUARTER,
    };

    pub fn bpm(self) -> f64 {
        MICROSECONDS_PER_MINUTE / self.us_per_quarter.max(1) as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator: numerator.max(1),
            denominator: denominator.max(1),
        }
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::COMMON
    }
}

impl std::fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoPoint {
    pub tick: Tick,
    pub us_per_quarter: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePoint {
    pub tick: Tick,
    pub signature: TimeSignature,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Channel(ChannelMessage),
    SysEx,
    Meta,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedEvent {
    pub tick: Tick,
    pub kind: EventKind,
}

impl TimedEvent {
    pub fn channel(tick: Tick, message: ChannelMessage) -> Self {
        Self {
            tick,
            kind: EventKind::Channel(message),
        }
    }

    pub fn channel_message(&self) -> Option<&ChannelMessage> {
        match &self.kind {
            EventKind::Channel(message) => Some(message),
            _ => None,
        }
    }
}

/// One track chunk of a decoded file, events in absolute ticks.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawTrack {
    pub name: Option<String>,
    pub instrument_names: Vec<String>,
    pub events: Vec<TimedEvent>,
}

/// A MIDI file decoded into tracks plus its tempo metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MidiFile {
    pub title: Option<String>,
    pub ppq: u16,
    pub tempo_points: Vec<TempoPoint>,
    pub signature_points: Vec<SignaturePoint>,
    pub tracks: Vec<RawTrack>,
}

impl MidiFile {
    pub fn new(ppq: u16) -> Self {
        Self {
            title: None,
            ppq,
            tempo_points: Vec::new(),
            signature_points: Vec::new(),
            tracks: Vec::new(),
        }
    }
}
