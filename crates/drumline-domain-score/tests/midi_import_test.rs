use drumline_domain_score::{
    import_midi_bytes, import_midi_path, EventKind, LaneKey, MidiImportError, Song, SongOptions,
    TimeSignature,
};
use drumline_ports::midi::ChannelEvent;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use pretty_assertions::assert_eq;

fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind,
    }
}

fn note(channel: u8, key: u8, vel: u8, on: bool) -> TrackEventKind<'static> {
    let key = u7::new(key);
    let vel = u7::new(vel);
    TrackEventKind::Midi {
        channel: u4::new(channel),
        message: if on {
            MidiMessage::NoteOn { key, vel }
        } else {
            MidiMessage::NoteOff { key, vel }
        },
    }
}

fn build_midi(tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
    let smf = Smf {
        header: Header {
            format: Format::Parallel,
            timing: Timing::Metrical(u15::new(480)),
        },
        tracks,
    };
    let mut data = Vec::new();
    smf.write(&mut data).expect("midi write should succeed");
    data
}

fn two_track_file() -> Vec<u8> {
    let conductor = vec![
        event(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(600_000)))),
        event(0, TrackEventKind::Meta(MetaMessage::TimeSignature(3, 2, 24, 8))),
        event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
    ];
    let drums = vec![
        event(0, TrackEventKind::Meta(MetaMessage::TrackName(b"Drum Kit"))),
        event(0, TrackEventKind::Meta(MetaMessage::InstrumentName(b"Standard"))),
        event(0, note(9, 36, 110, true)),
        event(240, note(9, 36, 0, true)),
        event(240, note(9, 38, 90, true)),
        event(240, note(9, 38, 64, false)),
        event(0, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
    ];
    build_midi(vec![conductor, drums])
}

#[test]
fn import_keeps_tracks_and_tempo_metadata() {
    let file = import_midi_bytes(&two_track_file()).expect("import should succeed");

    assert_eq!(file.ppq, 480);
    assert_eq!(file.tracks.len(), 2);
    assert_eq!(file.tempo_points.len(), 1);
    assert_eq!(file.tempo_points[0].us_per_quarter, 600_000);
    assert_eq!(file.signature_points[0].signature, TimeSignature::new(3, 4));

    let drums = &file.tracks[1];
    assert_eq!(drums.name.as_deref(), Some("Drum Kit"));
    assert_eq!(drums.instrument_names, vec!["Standard".to_string()]);

    let channel_events: Vec<_> = drums
        .events
        .iter()
        .filter_map(|e| e.channel_message().map(|m| (e.tick, m.channel, m.event)))
        .collect();
    assert_eq!(
        channel_events,
        vec![
            (
                0,
                9,
                ChannelEvent::NoteOn {
                    note: 36,
                    velocity: 110
                }
            ),
            (
                240,
                9,
                ChannelEvent::NoteOn {
                    note: 36,
                    velocity: 0
                }
            ),
            (
                480,
                9,
                ChannelEvent::NoteOn {
                    note: 38,
                    velocity: 90
                }
            ),
            (
                720,
                9,
                ChannelEvent::NoteOff {
                    note: 38,
                    velocity: 64
                }
            ),
        ]
    );
    assert!(drums
        .events
        .iter()
        .any(|e| matches!(e.kind, EventKind::Meta)));
}

#[test]
fn imported_file_builds_a_song() {
    let file = import_midi_bytes(&two_track_file()).expect("import should succeed");
    let song = Song::build(&file, SongOptions::default());

    assert_eq!(song.tracks().count(), 1);
    let drums = song.primary_track().expect("primary track");
    assert!(drums.is_likely_drum);
    assert_eq!(drums.index, 1);

    let kick = drums.lane(LaneKey::Note(36)).expect("kick lane");
    assert_eq!(kick.notes.len(), 1);
    assert!((kick.notes[0].duration_ms - 300.0).abs() < 1e-9);

    // 3/4 at 480 ppq: one bar of 1440 ticks, song ends at 720.
    assert_eq!(song.measures().len(), 1);
    assert_eq!(song.measures()[0].end_tick, 720);
    assert!((song.length_ms() - 900.0).abs() < 1e-9);
}

#[test]
fn garbage_is_a_parse_error() {
    let err = import_midi_bytes(b"not a midi file").expect_err("should fail");
    assert!(matches!(err, MidiImportError::Parse(_)));
}

#[test]
fn missing_path_is_an_io_error() {
    let err = import_midi_path(std::path::Path::new("/definitely/not/here.mid"))
        .expect_err("should fail");
    assert!(matches!(err, MidiImportError::Io(_)));
}
