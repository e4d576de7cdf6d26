use drumline_ports::types::Millis;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// Practice range in song milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayRange {
    pub start_ms: Millis,
    pub end_ms: Millis,
}

impl PlayRange {
    /// Orders the bounds and clamps them into `[0, length_ms]`.
    ///
    /// A non-finite start falls back to 0 and a non-finite end to `length_ms`.
    pub fn normalized(start_ms: Millis, end_ms: Millis, length_ms: Millis) -> Self {
        let length_ms = if length_ms.is_finite() { length_ms } else { 0.0 };
        let start_ms = if start_ms.is_finite() { start_ms } else { 0.0 };
        let end_ms = if end_ms.is_finite() { end_ms } else { length_ms };
        let (lo, hi) = if start_ms <= end_ms {
            (start_ms, end_ms)
        } else {
            (end_ms, start_ms)
        };
        let length_ms = length_ms.max(0.0);
        Self {
            start_ms: lo.clamp(0.0, length_ms),
            end_ms: hi.clamp(0.0, length_ms),
        }
    }
}

/// Virtual song clock: `seek_offset + (now - anchor) × speed` while playing.
#[derive(Clone, Debug)]
pub struct Transport {
    state: TransportState,
    anchor: Duration,
    seek_offset_ms: Millis,
    speed: f64,
    range: Option<PlayRange>,
    length_ms: Millis,
}

impl Transport {
    pub fn new(length_ms: Millis) -> Self {
        Self {
            state: TransportState::Stopped,
            anchor: Duration::ZERO,
            seek_offset_ms: 0.0,
            speed: 1.0,
            range: None,
            length_ms: length_ms.max(0.0),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn length_ms(&self) -> Millis {
        self.length_ms
    }

    pub fn position(&self, now: Duration) -> Millis {
        match self.state {
            TransportState::Playing => {
                let elapsed = now.saturating_sub(self.anchor).as_micros() as f64 / 1000.0;
                self.seek_offset_ms + elapsed * self.speed
            }
            TransportState::Stopped | TransportState::Paused => self.seek_offset_ms,
        }
    }

    pub fn play(&mut self, now: Duration) {
        if self.state == TransportState::Playing {
            return;
        }
        self.anchor = now;
        self.state = TransportState::Playing;
    }

    pub fn pause(&mut self, now: Duration) {
        self.seek_offset_ms = self.position(now);
        self.state = TransportState::Paused;
    }

    /// Rewinds to the start of the range (or the song).
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.seek_offset_ms = self.start_ms();
    }

    pub fn seek(&mut self, ms: Millis, now: Duration) -> Millis {
        self.seek_offset_ms = self.clamp(ms);
        self.anchor = now;
        self.seek_offset_ms
    }

    pub fn set_speed(&mut self, speed: f64, now: Duration) -> f64 {
        self.seek_offset_ms = self.position(now);
        self.anchor = now;
        self.speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
        self.speed
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Returns the position after clamping it into the new range.
    pub fn set_range(&mut self, range: Option<PlayRange>, now: Duration) -> Millis {
        let position = self.position(now);
        self.range = range;
        self.seek(position, now)
    }

    pub fn range(&self) -> Option<PlayRange> {
        self.range
    }

    pub fn start_ms(&self) -> Millis {
        self.range.map_or(0.0, |range| range.start_ms)
    }

    pub fn end_ms(&self) -> Millis {
        self.range.map_or(self.length_ms, |range| range.end_ms)
    }

    fn clamp(&self, ms: Millis) -> Millis {
        let ms = if ms.is_finite() { ms } else { 0.0 };
        ms.clamp(self.start_ms(), self.end_ms().max(self.start_ms()))
    }
}
