use crate::midi::ChannelMessage;

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Output device the scheduler dispatches to.
///
/// Thread model: `send_event` is called from the dispatch thread only, but a
/// sink may be swapped by the control thread at any time, so implementations
/// must be `Send + Sync`.
pub trait EventSink: Send + Sync {
    fn send_event(&self, message: ChannelMessage) -> Result<(), SinkError>;

    fn name(&self) -> &str {
        "sink"
    }
}

/// Sink that drops everything. Used until a real device is attached.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn send_event(&self, _message: ChannelMessage) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
