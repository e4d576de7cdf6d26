use crate::clock::Clock;
use crate::ipc::{Command, Event, EventBus};
use crate::playback_engine::{PlaybackEngine, PlaybackError, PlaybackObserver};
use crate::playback_params::PlaybackParams;
use crate::transport::{PlayRange, TransportState};
use drumline_domain_eval::{HitOutcome, JudgeConfig, ScoreSummary, Scoreboard};
use drumline_domain_score::{
    import_midi_path, LaneId, LaneKey, MidiFile, MidiImportError, MuteState, NoteRef, Song,
    SongOptions, Track,
};
use drumline_ports::midi::PadHit;
use drumline_ports::sink::{EventSink, SinkError};
use drumline_ports::storage::{SettingsDto, StorageError, StoragePort};
use drumline_ports::types::{ChannelSet, Millis};
use log::{info, warn};
use parking_lot::RwLock;
use rtrb::Consumer;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("import failed: {0}")]
    Import(#[from] MidiImportError),
    #[error("playback error: {0}")]
    Playback(#[from] PlaybackError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Scoring state reachable from the dispatch thread.
struct Session {
    scoreboard: RwLock<Arc<Scoreboard>>,
    bus: EventBus,
}

impl Session {
    fn scoreboard(&self) -> Arc<Scoreboard> {
        self.scoreboard.read().clone()
    }

    fn reset(&self) {
        let board = self.scoreboard();
        board.reset_all();
        for lane in 0..board.lane_count() {
            self.bus.publish(Event::LaneStateChanged {
                lane,
                clean_reset: true,
            });
        }
        self.bus.publish(Event::ScoreUpdated {
            summary: board.summary(),
        });
    }
}

impl PlaybackObserver for Session {
    fn on_notes_finished(&self, notes: &[NoteRef]) {
        let board = self.scoreboard();
        let changed = board.notes_finished(notes);
        if changed.is_empty() {
            return;
        }
        for lane in changed {
            self.bus.publish(Event::LaneStateChanged {
                lane,
                clean_reset: false,
            });
        }
        self.bus.publish(Event::ScoreUpdated {
            summary: board.summary(),
        });
    }

    fn on_repeat(&self) {
        self.reset();
    }

    fn on_state(&self, playing: bool) {
        self.bus.publish(Event::PlaybackStateChanged { playing });
    }

    fn on_sink_error(&self, error: &SinkError) {
        self.bus.publish(Event::SinkError {
            message: error.to_string(),
        });
    }
}

/// Control surface over one loaded song, its playback and its score.
pub struct AppCore {
    engine: PlaybackEngine,
    session: Arc<Session>,
    storage: Option<Box<dyn StoragePort>>,
    settings: SettingsDto,
    source: Option<MidiFile>,
    song: Option<Song>,
    selected_track: Option<(u8, u16)>,
    muted_tracks: BTreeSet<u16>,
}

impl AppCore {
    pub fn new(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        storage: Option<Box<dyn StoragePort>>,
    ) -> Self {
        let settings = match storage.as_ref().map(|storage| storage.load_settings()) {
            Some(Ok(settings)) => settings,
            Some(Err(err)) => {
                warn!("Failed to load settings, using defaults: {}", err);
                SettingsDto::default()
            }
            None => SettingsDto::default(),
        };
        Self::with_settings(clock, sink, storage, settings)
    }

    pub fn with_settings(
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        storage: Option<Box<dyn StoragePort>>,
        mut settings: SettingsDto,
    ) -> Self {
        let session = Arc::new(Session {
            scoreboard: RwLock::new(Arc::new(Scoreboard::empty())),
            bus: EventBus::new(),
        });
        let params = Arc::new(PlaybackParams::new(&settings));
        let engine = PlaybackEngine::new(
            clock,
            sink,
            params,
            Arc::clone(&session) as Arc<dyn PlaybackObserver>,
        );
        settings.speed = engine.set_speed(settings.speed);

        Self {
            engine,
            session,
            storage,
            settings,
            source: None,
            song: None,
            selected_track: None,
            muted_tracks: BTreeSet::new(),
        }
    }

    pub fn handle_command(&mut self, cmd: Command) -> Result<(), AppError> {
        match cmd {
            Command::Load { path } => self.load(Path::new(&path))?,
            Command::Start => self.start()?,
            Command::Pause => self.pause()?,
            Command::Stop => self.stop()?,
            Command::Seek { ms } => {
                self.seek(ms);
            }
            Command::SeekDisplay { ms } => {
                self.seek_display(ms);
            }
            Command::SetSpeed { multiplier } => {
                self.set_speed(multiplier);
            }
            Command::SetMutedChannels { channels } => {
                self.set_muted_channels(channels.into_iter().collect());
            }
            Command::SetTrackMuted { track, muted } => self.set_track_muted(track, muted),
            Command::SetLoop { enabled } => self.set_loop(enabled),
            Command::SetRange { start_ms, end_ms } => {
                self.set_range(Some((start_ms, end_ms)));
            }
            Command::ClearRange => {
                self.set_range(None);
            }
            Command::SetReduceArticulations { enabled } => self.set_reduce_articulations(enabled)?,
            Command::SetVisualLatency { ms } => self.set_visual_latency(ms),
            Command::SetInputOffset { ms } => self.set_input_offset(ms),
            Command::SelectTrack { channel, track } => {
                self.select_track(channel, track);
            }
            Command::Hit(hit) => {
                self.hit_pad(hit);
            }
            Command::Clean => self.clean(),
        }
        Ok(())
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        self.session.bus.subscribe()
    }

    pub fn take_position_stream(&self) -> Option<Consumer<Millis>> {
        self.engine.take_position_stream()
    }

    /// A failed import leaves the current song and playback untouched.
    pub fn load(&mut self, path: &Path) -> Result<(), AppError> {
        info!("Loading '{}'", path.display());
        match import_midi_path(path) {
            Ok(file) => self.load_file(file),
            Err(err) => {
                warn!("Failed to load '{}': {}", path.display(), err);
                self.session.bus.publish(Event::LoadFailed {
                    message: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    pub fn load_file(&mut self, file: MidiFile) -> Result<(), AppError> {
        let song = Song::build(&file, self.song_options());
        self.source = Some(file);
        self.install(song, 0.0)?;
        if let Some(song) = self.song.as_ref() {
            info!(
                "Loaded '{}': {} tracks, {} lanes, {:.1}ms",
                song.title().unwrap_or("untitled"),
                song.tracks().count(),
                song.lanes().count(),
                song.length_ms()
            );
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), AppError> {
        if self.song.is_none() {
            return Err(PlaybackError::NoSong.into());
        }
        self.engine.start()?;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), AppError> {
        self.engine.pause()?;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), AppError> {
        self.engine.stop()?;
        Ok(())
    }

    pub fn seek(&mut self, ms: Millis) -> Millis {
        self.engine.seek(ms)
    }

    pub fn seek_display(&mut self, ms: Millis) -> Millis {
        self.engine.seek(ms + self.settings.visual_latency_ms)
    }

    pub fn set_speed(&mut self, multiplier: f64) -> f64 {
        self.settings.speed = self.engine.set_speed(multiplier);
        self.settings_changed();
        self.settings.speed
    }

    /// Muting a channel mutes every track on it.
    pub fn set_muted_channels(&mut self, channels: ChannelSet) {
        self.muted_tracks = self
            .song
            .as_ref()
            .map(|song| {
                song.tracks()
                    .filter(|track| channels.contains(track.channel))
                    .map(|track| track.index)
                    .collect()
            })
            .unwrap_or_default();
        self.engine.set_muted_channels(channels);
        self.settings.muted_channels = channels.iter().collect();
        self.settings_changed();
    }

    /// The dispatcher mutes by channel, so this mutes every channel the
    /// track plays on.
    pub fn set_track_muted(&mut self, track: u16, muted: bool) {
        let Some(song) = self.song.as_ref() else {
            return;
        };
        let track_channels: ChannelSet = song
            .tracks()
            .filter(|t| t.index == track)
            .map(|t| t.channel)
            .collect();
        if track_channels.is_empty() {
            return;
        }
        let mut channels = self.engine.muted_channels();
        for channel in track_channels.iter() {
            if muted {
                channels.insert(channel);
            } else {
                channels.remove(channel);
            }
        }
        self.set_muted_channels(channels);
    }

    pub fn channel_mute_state(&self, channel: u8) -> Option<MuteState> {
        self.song
            .as_ref()
            .and_then(|song| song.channel_mute_state(channel, &self.muted_tracks))
    }

    pub fn set_loop(&mut self, enabled: bool) {
        self.engine.set_loop(enabled);
        self.settings.loop_enabled = enabled;
        self.settings_changed();
    }

    /// `None` clears the range. Returns the (possibly clamped) position.
    pub fn set_range(&mut self, range: Option<(Millis, Millis)>) -> Millis {
        let length_ms = self.engine.length_ms();
        let range = range.map(|(start, end)| PlayRange::normalized(start, end, length_ms));
        self.engine.set_range(range)
    }

    pub fn range(&self) -> Option<PlayRange> {
        self.engine.range()
    }

    /// Rebuilds the lanes from the loaded file, keeping position and play state.
    pub fn set_reduce_articulations(&mut self, enabled: bool) -> Result<(), AppError> {
        self.settings.reduce_articulations = enabled;
        self.settings_changed();

        let Some(file) = self.source.as_ref() else {
            return Ok(());
        };
        let song = Song::build(file, self.song_options());
        let position = self.engine.position_ms();
        let range = self.engine.range();
        let was_playing = self.engine.is_playing();
        let selected = self.selected_track;

        self.install(song, position)?;
        if range.is_some() {
            self.engine.set_range(range);
        }
        if let Some((channel, track)) = selected {
            self.select_track(channel, track);
        }
        if was_playing {
            self.engine.start()?;
        }
        Ok(())
    }

    pub fn set_visual_latency(&mut self, ms: Millis) {
        let ms = ms.max(0.0);
        self.engine.params().set_visual_latency_ms(ms);
        self.settings.visual_latency_ms = ms;
        self.settings_changed();
    }

    pub fn set_input_offset(&mut self, ms: Millis) {
        self.settings.input_offset_ms = ms;
        self.settings_changed();
    }

    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        self.engine.set_sink(sink);
    }

    /// Returns whether the track exists.
    pub fn select_track(&mut self, channel: u8, track: u16) -> bool {
        let exists = self
            .song
            .as_ref()
            .is_some_and(|song| song.track(channel, track).is_some());
        if exists {
            self.selected_track = Some((channel, track));
        }
        exists
    }

    pub fn selected_track(&self) -> Option<&Track> {
        let (channel, index) = self.selected_track?;
        self.song.as_ref()?.track(channel, index)
    }

    /// A zero-velocity strike is a pad release and is not judged.
    pub fn hit_pad(&self, hit: PadHit) -> Option<HitOutcome> {
        if hit.velocity == 0 {
            return None;
        }
        self.hit_note(hit.note)
    }

    /// Routes a pad strike to the selected track, stamped with the live clock.
    pub fn hit_note(&self, note: u8) -> Option<HitOutcome> {
        let song = self.song.as_ref()?;
        let (channel, track) = self.selected_track?;
        let lane = LaneId {
            channel,
            track,
            key: LaneKey::for_note(note, song.options().reduce_articulations),
        };
        let time_ms = self.engine.position_ms() - self.settings.input_offset_ms;
        self.register_hit(&lane, time_ms)
    }

    /// Unknown lanes and empty lanes are ignored.
    pub fn register_hit(&self, lane: &LaneId, time_ms: Millis) -> Option<HitOutcome> {
        let board = self.session.scoreboard();
        let lane_idx = board.lane_index(lane)?;
        let outcome = board.register_hit_at(lane_idx, time_ms)?;

        self.session.bus.publish(Event::InputReceived {
            lane: lane_idx,
            time_ms,
            outcome,
        });
        if let HitOutcome::Matched { .. } = outcome {
            self.session.bus.publish(Event::LaneStateChanged {
                lane: lane_idx,
                clean_reset: false,
            });
            self.session.bus.publish(Event::ScoreUpdated {
                summary: board.summary(),
            });
        }
        Some(outcome)
    }

    /// Every note back to pending, every stray dropped.
    pub fn clean(&self) {
        self.session.reset();
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    pub fn scoreboard(&self) -> Arc<Scoreboard> {
        self.session.scoreboard()
    }

    pub fn summary(&self) -> ScoreSummary {
        self.session.scoreboard().summary()
    }

    pub fn settings(&self) -> &SettingsDto {
        &self.settings
    }

    pub fn position_ms(&self) -> Millis {
        self.engine.position_ms()
    }

    pub fn display_position_ms(&self) -> Millis {
        self.engine.display_position_ms()
    }

    pub fn state(&self) -> TransportState {
        self.engine.state()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn speed(&self) -> f64 {
        self.engine.speed()
    }

    pub fn muted_channels(&self) -> ChannelSet {
        self.engine.muted_channels()
    }

    fn song_options(&self) -> SongOptions {
        SongOptions {
            reduce_articulations: self.settings.reduce_articulations,
        }
    }

    fn install(&mut self, song: Song, resume_at: Millis) -> Result<(), AppError> {
        self.engine
            .load(Arc::from(song.events().to_vec()), song.length_ms())?;
        *self.session.scoreboard.write() =
            Arc::new(Scoreboard::from_song(&song, JudgeConfig::default()));

        let muted = self.engine.muted_channels();
        self.muted_tracks = song
            .tracks()
            .filter(|track| muted.contains(track.channel))
            .map(|track| track.index)
            .collect();
        self.selected_track = song
            .primary_track()
            .map(|track| (track.channel, track.index));

        self.session.bus.publish(Event::SongLoaded {
            title: song.title().map(str::to_string),
            length_ms: song.length_ms(),
            lanes: song.lanes().count(),
            measures: song.measures().len(),
        });
        self.song = Some(song);
        if resume_at > 0.0 {
            self.engine.seek(resume_at);
        }
        Ok(())
    }

    fn settings_changed(&self) {
        self.session.bus.publish(Event::SettingsUpdated {
            settings: self.settings.clone(),
        });
        if let Some(storage) = self.storage.as_ref() {
            if let Err(err) = storage.save_settings(&self.settings) {
                warn!("Failed to save settings: {}", err);
            }
        }
    }
}
