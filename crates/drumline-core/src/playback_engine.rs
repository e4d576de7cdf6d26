use crate::clock::Clock;
use crate::playback_params::PlaybackParams;
use crate::scheduler::Scheduler;
use crate::transport::{PlayRange, Transport, TransportState};
use drumline_domain_eval::IMPERFECT_LIMIT_MS;
use drumline_domain_score::{NoteRef, PlaybackEvent};
use drumline_ports::midi::ChannelMessage;
use drumline_ports::sink::{EventSink, SinkError};
use drumline_ports::types::{ChannelSet, Millis, CHANNEL_COUNT};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use rtrb::{Consumer, Producer, RingBuffer};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const POSITION_QUEUE_CAPACITY: usize = 256;

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("no song loaded")]
    NoSong,
    #[error("playback worker failed: {0}")]
    Worker(String),
}

/// Callbacks from the dispatch thread. Implementations must not block.
pub trait PlaybackObserver: Send + Sync {
    fn on_notes_finished(&self, notes: &[NoteRef]);
    fn on_repeat(&self);
    fn on_state(&self, playing: bool);
    fn on_sink_error(&self, error: &SinkError);
}

pub struct NullObserver;

impl PlaybackObserver for NullObserver {
    fn on_notes_finished(&self, _notes: &[NoteRef]) {}
    fn on_repeat(&self) {}
    fn on_state(&self, _playing: bool) {}
    fn on_sink_error(&self, _error: &SinkError) {}
}

enum ControlMsg {
    Stop,
}

enum Step {
    Continue,
    Repeat,
    Ended,
}

/// Clock and cursor move together under one lock.
struct Timeline {
    transport: Transport,
    scheduler: Scheduler,
}

struct Shared {
    clock: Arc<dyn Clock>,
    sink: RwLock<Arc<dyn EventSink>>,
    timeline: Mutex<Timeline>,
    params: Arc<PlaybackParams>,
    observer: Arc<dyn PlaybackObserver>,
}

impl Shared {
    fn send(&self, message: ChannelMessage) {
        let sink = self.sink.read().clone();
        if let Err(err) = sink.send_event(message) {
            warn!("Sink '{}' rejected {:?}: {}", sink.name(), message, err);
            self.observer.on_sink_error(&err);
        }
    }

    fn notes_off(&self, channels: impl Iterator<Item = u8>) {
        for channel in channels {
            self.send(ChannelMessage::all_notes_off(channel));
        }
    }

    fn all_notes_off(&self) {
        self.notes_off(0..CHANNEL_COUNT);
    }

    fn step(&self, positions: &mut Producer<Millis>) -> Step {
        let now = self.clock.now();
        let muted = self.params.muted_channels();

        let mut timeline = self.timeline.lock();
        let Timeline {
            transport,
            scheduler,
        } = &mut *timeline;

        let end = transport.end_ms();
        let position = transport.position(now).min(end);
        // Full queue: the viewer is behind, this sample is dropped.
        let _ = positions.push(self.params.display_position(position));

        for event in scheduler.due(position, muted) {
            self.send(event.message);
        }
        let mut finished = scheduler.finished(position);

        let start = transport.start_ms();
        // An empty range has nothing to repeat.
        let step = if position < end {
            Step::Continue
        } else if self.params.loop_enabled() && end > start {
            transport.seek(start, now);
            scheduler.seek(start);
            Step::Repeat
        } else {
            finished.extend(scheduler.finished_before(end));
            transport.stop();
            scheduler.seek(start);
            Step::Ended
        };
        drop(timeline);

        if !finished.is_empty() {
            self.observer.on_notes_finished(&finished);
        }
        step
    }
}

fn run(
    shared: Arc<Shared>,
    control: Receiver<ControlMsg>,
    mut positions: Producer<Millis>,
) -> Producer<Millis> {
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    debug!("Playback thread started");

    loop {
        match control.try_recv() {
            Ok(ControlMsg::Stop) | Err(TryRecvError::Disconnected) => {
                debug!("Playback thread received stop");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        match shared.step(&mut positions) {
            Step::Continue => {}
            Step::Repeat => {
                info!("End of range reached, repeating");
                shared.all_notes_off();
                shared.observer.on_repeat();
            }
            Step::Ended => {
                info!("End of song reached");
                shared.all_notes_off();
                shared.observer.on_state(false);
                break;
            }
        }

        sleeper.sleep(shared.params.tick_interval());
    }

    positions
}

/// Owns the dispatch thread and the state it shares with control callers.
pub struct PlaybackEngine {
    shared: Arc<Shared>,
    control_tx: Mutex<Option<Sender<ControlMsg>>>,
    worker: Mutex<Option<JoinHandle<Producer<Millis>>>>,
    positions: Mutex<Option<Producer<Millis>>>,
    position_rx: Mutex<Option<Consumer<Millis>>>,
}

impl PlaybackEngine {
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        params: Arc<PlaybackParams>,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Self {
        let (producer, consumer) = RingBuffer::new(POSITION_QUEUE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                clock,
                sink: RwLock::new(sink),
                timeline: Mutex::new(Timeline {
                    transport: Transport::new(0.0),
                    scheduler: Scheduler::new(IMPERFECT_LIMIT_MS),
                }),
                params,
                observer,
            }),
            control_tx: Mutex::new(None),
            worker: Mutex::new(None),
            positions: Mutex::new(Some(producer)),
            position_rx: Mutex::new(Some(consumer)),
        }
    }

    /// Display-space positions published by the dispatch loop; single consumer.
    pub fn take_position_stream(&self) -> Option<Consumer<Millis>> {
        self.position_rx.lock().take()
    }

    pub fn params(&self) -> &PlaybackParams {
        &self.shared.params
    }

    /// Stops playback and replaces the event list. Speed carries over, range does not.
    pub fn load(&self, events: Arc<[PlaybackEvent]>, length_ms: Millis) -> Result<(), PlaybackError> {
        self.stop()?;
        let now = self.shared.clock.now();
        let mut timeline = self.shared.timeline.lock();
        let speed = timeline.transport.speed();
        timeline.transport = Transport::new(length_ms);
        timeline.transport.set_speed(speed, now);
        timeline.scheduler.set_events(events);
        debug!(
            "Loaded {} events, {:.1}ms",
            timeline.scheduler.len(),
            length_ms
        );
        Ok(())
    }

    pub fn start(&self) -> Result<(), PlaybackError> {
        let mut worker = self.worker.lock();
        if let Some(handle) = worker.as_ref() {
            if !handle.is_finished() {
                return Ok(());
            }
        }
        if let Some(handle) = worker.take() {
            self.reclaim(handle)?;
        }

        {
            let now = self.shared.clock.now();
            let mut timeline = self.shared.timeline.lock();
            if timeline.scheduler.is_empty() {
                return Err(PlaybackError::NoSong);
            }
            if timeline.transport.position(now) >= timeline.transport.end_ms() {
                timeline.transport.stop();
                let start = timeline.transport.start_ms();
                timeline.scheduler.seek(start);
            }
            timeline.transport.play(now);
        }

        let positions = self
            .positions
            .lock()
            .take()
            .ok_or_else(|| PlaybackError::Worker("position queue lost".to_string()))?;
        let (tx, rx) = mpsc::channel::<ControlMsg>();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("drumline-playback".to_string())
            .spawn(move || run(shared, rx, positions))
            .map_err(|e| PlaybackError::Worker(e.to_string()))?;

        *self.control_tx.lock() = Some(tx);
        *worker = Some(handle);
        info!("Playback started at {:.1}ms", self.position_ms());
        self.shared.observer.on_state(true);
        Ok(())
    }

    pub fn pause(&self) -> Result<(), PlaybackError> {
        self.halt()?;
        {
            let now = self.shared.clock.now();
            let mut timeline = self.shared.timeline.lock();
            if timeline.transport.state() != TransportState::Playing {
                return Ok(());
            }
            timeline.transport.pause(now);
        }
        self.shared.all_notes_off();
        info!("Playback paused at {:.1}ms", self.position_ms());
        self.shared.observer.on_state(false);
        Ok(())
    }

    /// Rewinds to the range start. Stopping twice is a no-op.
    pub fn stop(&self) -> Result<(), PlaybackError> {
        self.halt()?;
        let before = {
            let mut timeline = self.shared.timeline.lock();
            let before = timeline.transport.state();
            timeline.transport.stop();
            let start = timeline.transport.start_ms();
            timeline.scheduler.seek(start);
            before
        };
        self.publish_position();
        if before == TransportState::Stopped {
            return Ok(());
        }

        self.shared.all_notes_off();
        info!("Playback stopped");
        if before == TransportState::Playing {
            self.shared.observer.on_state(false);
        }
        Ok(())
    }

    /// Returns the clamped position actually sought to.
    pub fn seek(&self, ms: Millis) -> Millis {
        let (position, playing) = {
            let now = self.shared.clock.now();
            let mut timeline = self.shared.timeline.lock();
            let position = timeline.transport.seek(ms, now);
            timeline.scheduler.seek(position);
            (position, timeline.transport.is_playing())
        };
        if playing {
            self.shared.all_notes_off();
        }
        self.publish_position();
        debug!("Seek to {:.1}ms", position);
        position
    }

    pub fn set_speed(&self, speed: f64) -> f64 {
        let now = self.shared.clock.now();
        self.shared.timeline.lock().transport.set_speed(speed, now)
    }

    pub fn speed(&self) -> f64 {
        self.shared.timeline.lock().transport.speed()
    }

    /// Newly muted channels get an all-notes-off so nothing hangs.
    pub fn set_muted_channels(&self, channels: ChannelSet) {
        let before = self.shared.params.muted_channels();
        self.shared.params.set_muted_channels(channels);
        if self.is_playing() {
            self.shared
                .notes_off(channels.iter().filter(|channel| !before.contains(*channel)));
        }
    }

    pub fn muted_channels(&self) -> ChannelSet {
        self.shared.params.muted_channels()
    }

    pub fn set_loop(&self, enabled: bool) {
        self.shared.params.set_loop_enabled(enabled);
    }

    /// Returns the position after clamping it into the range.
    pub fn set_range(&self, range: Option<PlayRange>) -> Millis {
        let now = self.shared.clock.now();
        let mut timeline = self.shared.timeline.lock();
        let before = timeline.transport.position(now);
        let position = timeline.transport.set_range(range, now);
        if position != before {
            timeline.scheduler.seek(position);
        }
        position
    }

    pub fn range(&self) -> Option<PlayRange> {
        self.shared.timeline.lock().transport.range()
    }

    /// Takes effect on the next dispatch; scheduling state is untouched.
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        info!("Output sink switched to '{}'", sink.name());
        *self.shared.sink.write() = sink;
    }

    pub fn position_ms(&self) -> Millis {
        let now = self.shared.clock.now();
        self.shared.timeline.lock().transport.position(now)
    }

    pub fn display_position_ms(&self) -> Millis {
        self.shared.params.display_position(self.position_ms())
    }

    pub fn length_ms(&self) -> Millis {
        self.shared.timeline.lock().transport.length_ms()
    }

    pub fn state(&self) -> TransportState {
        self.shared.timeline.lock().transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == TransportState::Playing
    }

    /// Whether the dispatch thread is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancels the dispatch thread and waits until it has exited.
    fn halt(&self) -> Result<(), PlaybackError> {
        if let Some(tx) = self.control_tx.lock().take() {
            let _ = tx.send(ControlMsg::Stop);
        }
        let handle = self.worker.lock().take();
        match handle {
            Some(handle) => self.reclaim(handle),
            None => Ok(()),
        }
    }

    fn reclaim(&self, handle: JoinHandle<Producer<Millis>>) -> Result<(), PlaybackError> {
        let positions = handle
            .join()
            .map_err(|_| PlaybackError::Worker("playback thread panicked".to_string()))?;
        *self.positions.lock() = Some(positions);
        debug!("Playback thread joined");
        Ok(())
    }

    fn publish_position(&self) {
        let display = self.display_position_ms();
        if let Some(positions) = self.positions.lock().as_mut() {
            let _ = positions.push(display);
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if let Err(err) = self.halt() {
            warn!("Failed to shut down playback thread: {}", err);
        }
    }
}
