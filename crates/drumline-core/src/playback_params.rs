use drumline_ports::storage::SettingsDto;
use drumline_ports::types::{ChannelSet, Millis};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::time::Duration;

/// Knobs the dispatch loop reads every iteration without taking a lock.
#[derive(Debug)]
pub struct PlaybackParams {
    muted_channels: AtomicU16,
    loop_enabled: AtomicBool,
    visual_latency_ms: AtomicU64,
    tick_interval_us: AtomicU64,
}

impl PlaybackParams {
    pub fn new(settings: &SettingsDto) -> Self {
        let muted: ChannelSet = settings.muted_channels.iter().copied().collect();
        Self {
            muted_channels: AtomicU16::new(muted.bits()),
            loop_enabled: AtomicBool::new(settings.loop_enabled),
            visual_latency_ms: AtomicU64::new(settings.visual_latency_ms.max(0.0).to_bits()),
            tick_interval_us: AtomicU64::new(settings.tick_interval_us.max(1)),
        }
    }

    pub fn set_muted_channels(&self, channels: ChannelSet) {
        self.muted_channels.store(channels.bits(), Ordering::Relaxed);
    }

    pub fn muted_channels(&self) -> ChannelSet {
        ChannelSet::from_bits(self.muted_channels.load(Ordering::Relaxed))
    }

    pub fn set_loop_enabled(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::Relaxed)
    }

    pub fn set_visual_latency_ms(&self, ms: Millis) {
        self.visual_latency_ms
            .store(ms.max(0.0).to_bits(), Ordering::Relaxed);
    }

    pub fn visual_latency_ms(&self) -> Millis {
        f64::from_bits(self.visual_latency_ms.load(Ordering::Relaxed))
    }

    pub fn set_tick_interval_us(&self, us: u64) {
        self.tick_interval_us.store(us.max(1), Ordering::Relaxed);
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(self.tick_interval_us.load(Ordering::Relaxed))
    }

    /// Song time as shown to the viewer, never negative.
    pub fn display_position(&self, position_ms: Millis) -> Millis {
        (position_ms - self.visual_latency_ms()).max(0.0)
    }
}
