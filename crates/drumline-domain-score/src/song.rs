use crate::kit::{lane_display_name, KitArticulation};
use crate::layout::solve_note_widths;
use crate::measure::{beat_grid, extract_measures, BeatLine, Measure};
use crate::model::{MidiFile, RawTrack};
use crate::tempo::TempoMap;
use drumline_ports::midi::{ChannelEvent, ChannelMessage};
use drumline_ports::types::{ChannelSet, Millis, Tick};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;

/// Case-insensitive substrings marking a track as a drum track.
pub const DRUM_KEYWORDS: [&str; 3] = ["drum", "kit", "perc"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HitState {
    #[default]
    Pending,
    Hit,
    Rushed,
    Dragged,
    Missed,
}

impl HitState {
    pub fn is_pending(self) -> bool {
        self == HitState::Pending
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub note: u8,
    pub channel: u8,
    pub velocity: u8,
    pub start_tick: Tick,
    pub duration_ticks: Tick,
    /// Index of the note-on event inside its source track.
    pub source_event: usize,
    pub start_ms: Millis,
    pub duration_ms: Millis,
    /// Duration in quarter notes, clamped to `[0, 1]`.
    pub beat_fraction: f64,
    pub rect_start_ms: Millis,
    pub width_ms: Millis,
    pub state: HitState,
    pub hit_offset_ms: Option<Millis>,
}

impl Note {
    pub fn end_ms(&self) -> Millis {
        self.start_ms + self.duration_ms
    }

    pub fn rect_end_ms(&self) -> Millis {
        self.rect_start_ms + self.width_ms
    }

    pub fn reset(&mut self) {
        self.state = HitState::Pending;
        self.hit_offset_ms = None;
    }
}

/// What a lane groups its notes by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LaneKey {
    Note(u8),
    Kit(KitArticulation),
}

impl LaneKey {
    pub fn for_note(note: u8, reduce_articulations: bool) -> Self {
        if reduce_articulations {
            LaneKey::Kit(KitArticulation::from_note(note))
        } else {
            LaneKey::Note(note)
        }
    }

    pub fn display_name(&self, channel: u8) -> String {
        match self {
            LaneKey::Note(note) => lane_display_name(*note, channel),
            LaneKey::Kit(articulation) => articulation.name().to_string(),
        }
    }
}

impl fmt::Display for LaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKey::Note(note) => write!(f, "note{}", note),
            LaneKey::Kit(articulation) => write!(f, "{:?}", articulation),
        }
    }
}

/// Stable lane identity: rebuilding from the same file yields the same ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LaneId {
    pub channel: u8,
    /// Index of the source track chunk in the file.
    pub track: u16,
    pub key: LaneKey,
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}/t{}/{}", self.channel, self.track, self.key)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lane {
    pub id: LaneId,
    pub name: String,
    /// Sorted by start tick; neighbours are addressed by index.
    pub notes: Vec<Note>,
}

impl Lane {
    pub fn previous(&self, index: usize) -> Option<&Note> {
        index.checked_sub(1).and_then(|i| self.notes.get(i))
    }

    pub fn next(&self, index: usize) -> Option<&Note> {
        self.notes.get(index + 1)
    }

    pub fn reset_scores(&mut self) {
        self.notes.iter_mut().for_each(Note::reset);
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    /// Index of the source track chunk in the file.
    pub index: u16,
    pub channel: u8,
    pub name: String,
    pub instrument_name: String,
    pub is_likely_drum: bool,
    pub lanes: Vec<Lane>,
}

impl Track {
    pub fn note_count(&self) -> usize {
        self.lanes.iter().map(|lane| lane.notes.len()).sum()
    }

    pub fn lane(&self, key: LaneKey) -> Option<&Lane> {
        self.lanes.iter().find(|lane| lane.id.key == key)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MuteState {
    None,
    Mixed,
    All,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Channel {
    pub id: u8,
    pub tracks: Vec<Track>,
}

impl Channel {
    pub fn mute_state(&self, muted_tracks: &BTreeSet<u16>) -> MuteState {
        let muted = self
            .tracks
            .iter()
            .filter(|track| muted_tracks.contains(&track.index))
            .count();
        match muted {
            0 => MuteState::None,
            n if n == self.tracks.len() => MuteState::All,
            _ => MuteState::Mixed,
        }
    }
}

/// Position of a note in the song's flattened lane order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteRef {
    pub lane: usize,
    pub note: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub tick: Tick,
    pub time_ms: Millis,
    pub message: ChannelMessage,
    /// Set on note-ons that belong to a lane.
    pub note: Option<NoteRef>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongOptions {
    pub reduce_articulations: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum TrackBuildError {
    #[error("track {0} has no notes")]
    NoNotes(usize),
}

#[derive(Clone, Debug)]
pub struct Song {
    title: Option<String>,
    options: SongOptions,
    tempo_map: TempoMap,
    measures: Vec<Measure>,
    channels: Vec<Channel>,
    events: Vec<PlaybackEvent>,
    end_tick: Tick,
    length_ms: Millis,
}

#[derive(Debug)]
struct PairedNote {
    source_event: usize,
    channel: u8,
    note: u8,
    velocity: u8,
    start_tick: Tick,
    end_tick: Tick,
}

impl Song {
    pub fn build(file: &MidiFile, options: SongOptions) -> Self {
        let tempo_map = TempoMap::new(
            file.ppq,
            file.tempo_points.clone(),
            file.signature_points.clone(),
        );

        let mut by_channel: BTreeMap<u8, BTreeMap<u16, Vec<PairedNote>>> = BTreeMap::new();
        for (track_idx, raw) in file.tracks.iter().enumerate() {
            match pair_notes(track_idx, raw) {
                Ok(notes) => {
                    for note in notes {
                        by_channel
                            .entry(note.channel)
                            .or_default()
                            .entry(track_idx as u16)
                            .or_default()
                            .push(note);
                    }
                }
                Err(err) => debug!("Dropping track: {}", err),
            }
        }

        let channels: Vec<Channel> = by_channel
            .into_iter()
            .map(|(channel_id, tracks)| Channel {
                id: channel_id,
                tracks: tracks
                    .into_iter()
                    .map(|(track_idx, notes)| {
                        build_track(
                            &file.tracks[track_idx as usize],
                            track_idx,
                            channel_id,
                            notes,
                            &tempo_map,
                            options,
                        )
                    })
                    .collect(),
            })
            .collect();

        let mut note_refs: HashMap<(usize, usize), NoteRef> = HashMap::new();
        let lanes = channels
            .iter()
            .flat_map(|channel| channel.tracks.iter())
            .flat_map(|track| track.lanes.iter().map(move |lane| (track.index, lane)));
        for (lane_idx, (track_idx, lane)) in lanes.enumerate() {
            for (note_idx, note) in lane.notes.iter().enumerate() {
                note_refs.insert(
                    (track_idx as usize, note.source_event),
                    NoteRef {
                        lane: lane_idx,
                        note: note_idx,
                    },
                );
            }
        }

        let events = flatten_events(file, &tempo_map, &note_refs);
        let end_tick = events
            .iter()
            .filter(|event| event.message.event.is_note_on() || event.message.event.is_note_off())
            .map(|event| event.tick)
            .max()
            .unwrap_or(0);
        let measures = extract_measures(&tempo_map, end_tick);
        let length_ms = tempo_map.ticks_to_ms(end_tick);

        debug!(
            "Built song with {} channels, {} events, {} measures, {:.1}ms",
            channels.len(),
            events.len(),
            measures.len(),
            length_ms
        );

        Self {
            title: file.title.clone(),
            options,
            tempo_map,
            measures,
            channels,
            events,
            end_tick,
            length_ms,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn options(&self) -> SongOptions {
        self.options
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn beat_grid(&self) -> Vec<BeatLine> {
        beat_grid(&self.measures, &self.tempo_map)
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Every channel event of the file in dispatch order.
    pub fn events(&self) -> &[PlaybackEvent] {
        &self.events
    }

    pub fn end_tick(&self) -> Tick {
        self.end_tick
    }

    pub fn length_ms(&self) -> Millis {
        self.length_ms
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.channels.iter().flat_map(|channel| channel.tracks.iter())
    }

    /// Lanes in flattened order; `NoteRef::lane` indexes this sequence.
    pub fn lanes(&self) -> impl Iterator<Item = &Lane> {
        self.tracks().flat_map(|track| track.lanes.iter())
    }

    pub fn lane_index(&self, id: &LaneId) -> Option<usize> {
        self.lanes().position(|lane| lane.id == *id)
    }

    pub fn note(&self, note_ref: NoteRef) -> Option<&Note> {
        self.lanes()
            .nth(note_ref.lane)
            .and_then(|lane| lane.notes.get(note_ref.note))
    }

    pub fn track(&self, channel: u8, index: u16) -> Option<&Track> {
        self.tracks()
            .find(|track| track.channel == channel && track.index == index)
    }

    /// First likely drum track, else the first track.
    pub fn primary_track(&self) -> Option<&Track> {
        self.tracks()
            .find(|track| track.is_likely_drum)
            .or_else(|| self.tracks().next())
    }

    pub fn channel_mute_state(&self, channel: u8, muted_tracks: &BTreeSet<u16>) -> Option<MuteState> {
        self.channels
            .iter()
            .find(|c| c.id == channel)
            .map(|c| c.mute_state(muted_tracks))
    }

    /// Muting a track mutes the whole channel it plays on.
    pub fn muted_channels(&self, muted_tracks: &BTreeSet<u16>) -> ChannelSet {
        self.channels
            .iter()
            .filter(|channel| channel.mute_state(muted_tracks) != MuteState::None)
            .map(|channel| channel.id)
            .collect()
    }
}

pub fn is_likely_drum_track(name: &str, instrument_name: &str) -> bool {
    let name = name.to_lowercase();
    let instrument_name = instrument_name.to_lowercase();
    DRUM_KEYWORDS
        .iter()
        .any(|key| name.contains(key) || instrument_name.contains(key))
}

fn pair_notes(track_idx: usize, raw: &RawTrack) -> Result<Vec<PairedNote>, TrackBuildError> {
    let mut open: HashMap<(u8, u8), VecDeque<(usize, Tick, u8)>> = HashMap::new();
    let mut notes = Vec::new();
    let last_tick = raw.events.iter().map(|event| event.tick).max().unwrap_or(0);

    for (idx, event) in raw.events.iter().enumerate() {
        let Some(message) = event.channel_message() else {
            continue;
        };
        let key = match message.event {
            ChannelEvent::NoteOn { note, velocity } if velocity > 0 => {
                open.entry((message.channel, note))
                    .or_default()
                    .push_back((idx, event.tick, velocity));
                continue;
            }
            ChannelEvent::NoteOn { note, .. } | ChannelEvent::NoteOff { note, .. } => {
                (message.channel, note)
            }
            _ => continue,
        };

        match open.get_mut(&key).and_then(|queue| queue.pop_front()) {
            Some((source_event, start_tick, velocity)) => notes.push(PairedNote {
                source_event,
                channel: key.0,
                note: key.1,
                velocity,
                start_tick,
                end_tick: event.tick,
            }),
            None => debug!(
                "Orphaned note-off for {} ch{} at tick {} (track {})",
                key.1, key.0, event.tick, track_idx
            ),
        }
    }

    for ((channel, note), queue) in open {
        for (source_event, start_tick, velocity) in queue {
            warn!(
                "Unclosed note-on for {} ch{} at tick {}, closing at {}",
                note, channel, start_tick, last_tick
            );
            notes.push(PairedNote {
                source_event,
                channel,
                note,
                velocity,
                start_tick,
                end_tick: last_tick.max(start_tick),
            });
        }
    }

    if notes.is_empty() {
        return Err(TrackBuildError::NoNotes(track_idx));
    }
    Ok(notes)
}

fn build_track(
    raw: &RawTrack,
    track_idx: u16,
    channel: u8,
    notes: Vec<PairedNote>,
    tempo_map: &TempoMap,
    options: SongOptions,
) -> Track {
    let name = raw
        .name
        .clone()
        .unwrap_or_else(|| format!("Track (Ch {})", channel + 1));
    let instrument_name = raw.instrument_names.join(", ");
    let is_likely_drum = is_likely_drum_track(&name, &instrument_name);

    let mut grouped: BTreeMap<LaneKey, Vec<Note>> = BTreeMap::new();
    for paired in notes {
        let key = LaneKey::for_note(paired.note, options.reduce_articulations);
        grouped
            .entry(key)
            .or_default()
            .push(make_note(&paired, tempo_map));
    }

    let lanes = grouped
        .into_iter()
        .map(|(key, mut notes)| {
            notes.sort_by(|a, b| {
                a.start_tick
                    .cmp(&b.start_tick)
                    .then(a.note.cmp(&b.note))
                    .then(a.source_event.cmp(&b.source_event))
            });
            let mut lane = Lane {
                id: LaneId {
                    channel,
                    track: track_idx,
                    key,
                },
                name: key.display_name(channel),
                notes,
            };
            solve_note_widths(&mut lane);
            lane
        })
        .collect();

    Track {
        index: track_idx,
        channel,
        name,
        instrument_name,
        is_likely_drum,
        lanes,
    }
}

fn make_note(paired: &PairedNote, tempo_map: &TempoMap) -> Note {
    let start_ms = tempo_map.ticks_to_ms(paired.start_tick);
    let end_ms = tempo_map.ticks_to_ms(paired.end_tick);
    let duration_ticks = paired.end_tick - paired.start_tick;
    let beat_fraction = (duration_ticks as f64 / tempo_map.ppq() as f64).clamp(0.0, 1.0);

    Note {
        note: paired.note,
        channel: paired.channel,
        velocity: paired.velocity,
        start_tick: paired.start_tick,
        duration_ticks,
        source_event: paired.source_event,
        start_ms,
        duration_ms: end_ms - start_ms,
        beat_fraction,
        rect_start_ms: start_ms,
        width_ms: 0.0,
        state: HitState::Pending,
        hit_offset_ms: None,
    }
}

fn event_rank(event: &ChannelEvent) -> u8 {
    if event.is_note_off() {
        1
    } else if event.is_note_on() {
        2
    } else {
        0
    }
}

fn flatten_events(
    file: &MidiFile,
    tempo_map: &TempoMap,
    note_refs: &HashMap<(usize, usize), NoteRef>,
) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    for (track_idx, raw) in file.tracks.iter().enumerate() {
        for (idx, event) in raw.events.iter().enumerate() {
            let Some(message) = event.channel_message() else {
                continue;
            };
            let note = if message.event.is_note_on() {
                note_refs.get(&(track_idx, idx)).copied()
            } else {
                None
            };
            events.push(PlaybackEvent {
                tick: event.tick,
                time_ms: tempo_map.ticks_to_ms(event.tick),
                message: *message,
                note,
            });
        }
    }

    events.sort_by(|a, b| {
        a.tick
            .cmp(&b.tick)
            .then_with(|| event_rank(&a.message.event).cmp(&event_rank(&b.message.event)))
    });
    events
}
