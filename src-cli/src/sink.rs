use drumline_ports::midi::{ChannelEvent, ChannelMessage};
use drumline_ports::sink::{EventSink, SinkError};
use log::{debug, trace};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stands in for an output device: every message goes to the log.
#[derive(Debug, Default)]
pub struct LoggingSink {
    sent: AtomicU64,
}

impl LoggingSink {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl EventSink for LoggingSink {
    fn send_event(&self, message: ChannelMessage) -> Result<(), SinkError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        match message.event {
            ChannelEvent::NoteOn { note, velocity } if velocity > 0 => {
                debug!("ch{:>2} on  {:>3} vel {:>3}", message.channel + 1, note, velocity)
            }
            _ => trace!("ch{:>2} {:?}", message.channel + 1, message.event),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
