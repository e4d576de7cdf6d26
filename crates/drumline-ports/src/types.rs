use serde::{Deserialize, Serialize};
use std::fmt;

pub type Tick = i64; // musical time, monotonic in a song
pub type Millis = f64; // song time in milliseconds

pub const CHANNEL_COUNT: u8 = 16;
pub const GM_PERCUSSION_CHANNEL: u8 = 9;

/// Set of MIDI channels packed into one word, bit `n` = channel `n`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSet(u16);

impl ChannelSet {
    pub const EMPTY: Self = Self(0);

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, channel: u8) -> bool {
        channel < CHANNEL_COUNT && self.0 & (1 << channel) != 0
    }

    pub fn insert(&mut self, channel: u8) {
        if channel < CHANNEL_COUNT {
            self.0 |= 1 << channel;
        }
    }

    pub fn remove(&mut self, channel: u8) {
        if channel < CHANNEL_COUNT {
            self.0 &= !(1 << channel);
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..CHANNEL_COUNT).filter(move |ch| self.contains(*ch))
    }
}

impl FromIterator<u8> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for channel in iter {
            set.insert(channel);
        }
        set
    }
}

impl fmt::Display for ChannelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels: Vec<String> = self.iter().map(|ch| ch.to_string()).collect();
        write!(f, "[{}]", channels.join(", "))
    }
}
