use drumline_domain_score::{NoteRef, PlaybackEvent};
use drumline_ports::types::{ChannelSet, Millis};
use std::sync::Arc;

/// Forward-only cursors over a song's time-ordered event list.
///
/// `cursor` tracks dispatch, `miss_cursor` trails it by the miss window and
/// reports note-ons whose matching window has closed.
#[derive(Clone, Debug)]
pub struct Scheduler {
    events: Arc<[PlaybackEvent]>,
    cursor: usize,
    miss_cursor: usize,
    miss_window_ms: Millis,
}

impl Scheduler {
    pub fn new(miss_window_ms: Millis) -> Self {
        Self {
            events: Arc::from(Vec::new()),
            cursor: 0,
            miss_cursor: 0,
            miss_window_ms,
        }
    }

    pub fn set_events(&mut self, events: Arc<[PlaybackEvent]>) {
        self.events = events;
        self.cursor = 0;
        self.miss_cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Notes before `ms` are skipped, not missed.
    pub fn seek(&mut self, ms: Millis) {
        self.cursor = self.events.partition_point(|event| event.time_ms < ms);
        self.miss_cursor = self.cursor;
    }

    /// Events at or before `now_ms` not yet dispatched, muted channels dropped.
    pub fn due(&mut self, now_ms: Millis, muted: ChannelSet) -> Vec<PlaybackEvent> {
        let mut due = Vec::new();
        while let Some(event) = self.events.get(self.cursor) {
            if event.time_ms > now_ms {
                break;
            }
            if !muted.contains(event.message.channel) {
                due.push(*event);
            }
            self.cursor += 1;
        }
        due
    }

    /// Lane notes whose start lies more than the miss window behind `now_ms`.
    pub fn finished(&mut self, now_ms: Millis) -> Vec<NoteRef> {
        let mut finished = Vec::new();
        while let Some(event) = self.events.get(self.miss_cursor) {
            if event.time_ms + self.miss_window_ms >= now_ms {
                break;
            }
            if let Some(note) = event.note {
                finished.push(note);
            }
            self.miss_cursor += 1;
        }
        finished
    }

    /// Every remaining lane note starting before `end_ms`, regardless of the window.
    pub fn finished_before(&mut self, end_ms: Millis) -> Vec<NoteRef> {
        self.finished(end_ms + self.miss_window_ms)
    }
}
