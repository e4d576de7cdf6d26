use serde::{Deserialize, Serialize};

/// Controller number of the "All Notes Off" channel-mode message.
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Decoded channel-voice message, without its channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    KeyPressure { note: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    ChannelPressure { pressure: u8 },
    /// 14-bit value, 8192 = centre.
    PitchBend { value: u16 },
}

impl ChannelEvent {
    /// Note-on with velocity 0 is a note-off by convention.
    pub fn is_note_on(&self) -> bool {
        matches!(self, ChannelEvent::NoteOn { velocity, .. } if *velocity > 0)
    }

    pub fn is_note_off(&self) -> bool {
        match self {
            ChannelEvent::NoteOff { .. } => true,
            ChannelEvent::NoteOn { velocity, .. } => *velocity == 0,
            _ => false,
        }
    }

    pub fn note(&self) -> Option<u8> {
        match self {
            ChannelEvent::NoteOn { note, .. }
            | ChannelEvent::NoteOff { note, .. }
            | ChannelEvent::KeyPressure { note, .. } => Some(*note),
            _ => None,
        }
    }
}

/// A channel event addressed to one of the 16 MIDI channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub channel: u8,
    pub event: ChannelEvent,
}

impl ChannelMessage {
    pub fn new(channel: u8, event: ChannelEvent) -> Self {
        Self { channel, event }
    }

    pub fn all_notes_off(channel: u8) -> Self {
        Self {
            channel,
            event: ChannelEvent::ControlChange {
                controller: CC_ALL_NOTES_OFF,
                value: 0,
            },
        }
    }
}

/// Raw strike from a drum pad, not yet stamped with song time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadHit {
    pub note: u8,
    pub velocity: u8,
}
