use drumline_domain_eval::{
    judge_hit, nearest_note, HitOutcome, JudgeConfig, ScoreSummary, Scoreboard,
};
use drumline_domain_score::{
    HitState, KitArticulation, Lane, LaneId, LaneKey, MidiFile, Note, NoteRef, RawTrack, Song,
    SongOptions, TimedEvent,
};
use drumline_ports::midi::{ChannelEvent, ChannelMessage};
use pretty_assertions::assert_eq;

fn note_at(start_ms: f64) -> Note {
    Note {
        note: 38,
        channel: 9,
        velocity: 100,
        start_tick: start_ms as i64,
        duration_ticks: 0,
        source_event: 0,
        start_ms,
        duration_ms: 0.0,
        beat_fraction: 0.0,
        rect_start_ms: start_ms,
        width_ms: 0.0,
        state: HitState::Pending,
        hit_offset_ms: None,
    }
}

fn snare_id() -> LaneId {
    LaneId {
        channel: 9,
        track: 0,
        key: LaneKey::Kit(KitArticulation::Snare),
    }
}

fn lane(starts: &[f64]) -> Lane {
    Lane {
        id: snare_id(),
        name: "Snare".to_string(),
        notes: starts.iter().copied().map(note_at).collect(),
    }
}

#[test]
fn input_within_perfect_window_is_hit() {
    let mut lane = lane(&[1000.0]);
    let outcome = judge_hit(&mut lane, 1050.0, &JudgeConfig::default());

    assert_eq!(
        outcome,
        Some(HitOutcome::Matched {
            note: 0,
            state: HitState::Hit,
            offset_ms: 50.0
        })
    );
    assert_eq!(lane.notes[0].state, HitState::Hit);
    assert_eq!(lane.notes[0].hit_offset_ms, Some(50.0));
}

#[test]
fn late_and_early_inputs_are_dragged_and_rushed() {
    let cfg = JudgeConfig::default();

    let mut late = lane(&[1000.0]);
    judge_hit(&mut late, 1090.0, &cfg);
    assert_eq!(late.notes[0].state, HitState::Dragged);
    assert_eq!(late.notes[0].hit_offset_ms, Some(90.0));

    let mut early = lane(&[1000.0]);
    judge_hit(&mut early, 910.0, &cfg);
    assert_eq!(early.notes[0].state, HitState::Rushed);
    assert_eq!(early.notes[0].hit_offset_ms, Some(-90.0));
}

#[test]
fn far_input_is_stray_and_leaves_note_pending() {
    let mut lane = lane(&[1000.0]);
    let outcome = judge_hit(&mut lane, 1150.0, &JudgeConfig::default());

    assert_eq!(outcome, Some(HitOutcome::Stray { time_ms: 1150.0 }));
    assert_eq!(lane.notes[0].state, HitState::Pending);
    assert_eq!(lane.notes[0].hit_offset_ms, None);
}

#[test]
fn empty_lane_is_a_no_op() {
    let mut lane = lane(&[]);
    assert_eq!(judge_hit(&mut lane, 10.0, &JudgeConfig::default()), None);
}

#[test]
fn nearest_note_prefers_earlier_on_ties() {
    let lane = lane(&[1000.0, 1100.0, 1100.0, 1300.0]);
    assert_eq!(nearest_note(&lane.notes, 1050.0), Some(0));
    assert_eq!(nearest_note(&lane.notes, 1051.0), Some(1));
    assert_eq!(nearest_note(&lane.notes, 1100.0), Some(1));
    assert_eq!(nearest_note(&lane.notes, 5000.0), Some(3));
    assert_eq!(nearest_note(&lane.notes, -5.0), Some(0));
}

#[test]
fn simultaneous_notes_are_consumed_in_order() {
    let cfg = JudgeConfig::default();
    let mut lane = lane(&[500.0, 500.0]);

    judge_hit(&mut lane, 510.0, &cfg);
    judge_hit(&mut lane, 520.0, &cfg);
    let third = judge_hit(&mut lane, 530.0, &cfg);

    assert_eq!(lane.notes[0].hit_offset_ms, Some(10.0));
    assert_eq!(lane.notes[1].hit_offset_ms, Some(20.0));
    assert_eq!(third, Some(HitOutcome::Stray { time_ms: 530.0 }));
}

#[test]
fn already_judged_nearest_note_yields_stray() {
    let cfg = JudgeConfig::default();
    let mut lane = lane(&[1000.0]);
    judge_hit(&mut lane, 1000.0, &cfg);
    let second = judge_hit(&mut lane, 1020.0, &cfg);

    assert_eq!(second, Some(HitOutcome::Stray { time_ms: 1020.0 }));
    assert_eq!(lane.notes[0].hit_offset_ms, Some(0.0));
}

#[test]
fn judged_nearest_note_shadows_pending_neighbour() {
    let board = Scoreboard::new(vec![lane(&[1000.0, 1100.0])], JudgeConfig::default());
    board.register_hit(&snare_id(), 1000.0);

    // 1045 is nearer the judged note than the pending one at 1100.
    assert_eq!(
        board.register_hit(&snare_id(), 1045.0),
        Some(HitOutcome::Stray { time_ms: 1045.0 })
    );
    assert_eq!(
        board.note_state(NoteRef { lane: 0, note: 1 }),
        Some((HitState::Pending, None))
    );

    board.notes_finished(&[NoteRef { lane: 0, note: 1 }]);
    assert_eq!(
        board.note_state(NoteRef { lane: 0, note: 1 }),
        Some((HitState::Missed, None))
    );
    assert_eq!(board.strays(0), vec![1045.0]);
}

#[test]
fn missed_once_and_only_from_pending() {
    let board = Scoreboard::new(vec![lane(&[1000.0, 2000.0])], JudgeConfig::default());
    board.register_hit(&snare_id(), 2010.0);

    let finished = [NoteRef { lane: 0, note: 0 }, NoteRef { lane: 0, note: 1 }];
    let changed = board.notes_finished(&finished);
    assert_eq!(changed.into_iter().collect::<Vec<_>>(), vec![0]);
    assert_eq!(
        board.note_state(finished[0]),
        Some((HitState::Missed, None))
    );
    assert_eq!(
        board.note_state(finished[1]),
        Some((HitState::Hit, Some(10.0)))
    );

    // A second report changes nothing.
    assert!(board.notes_finished(&finished).is_empty());
    // A hit cannot revive a missed note.
    assert_eq!(
        board.register_hit(&snare_id(), 1000.0),
        Some(HitOutcome::Stray { time_ms: 1000.0 })
    );
}

#[test]
fn unknown_lane_is_ignored() {
    let board = Scoreboard::new(vec![lane(&[1000.0])], JudgeConfig::default());
    let other = LaneId {
        channel: 9,
        track: 0,
        key: LaneKey::Note(99),
    };
    assert_eq!(board.register_hit(&other, 1000.0), None);
    assert!(board
        .notes_finished(&[NoteRef { lane: 7, note: 0 }])
        .is_empty());
}

#[test]
fn reset_is_idempotent() {
    let board = Scoreboard::new(vec![lane(&[1000.0, 2000.0])], JudgeConfig::default());
    board.register_hit(&snare_id(), 1030.0);
    board.register_hit(&snare_id(), 1500.0);
    board.notes_finished(&[NoteRef { lane: 0, note: 1 }]);

    board.reset_all();
    let once = board.lane(0).expect("lane");
    board.reset_all();
    let twice = board.lane(0).expect("lane");

    assert_eq!(once.notes, twice.notes);
    assert!(twice.notes.iter().all(|n| n.state == HitState::Pending));
    assert!(twice.notes.iter().all(|n| n.hit_offset_ms.is_none()));
    assert!(board.strays(0).is_empty());
    assert_eq!(
        board.summary(),
        ScoreSummary {
            pending: 2,
            ..ScoreSummary::default()
        }
    );
}

#[test]
fn summary_counts_every_state() {
    let board = Scoreboard::new(
        vec![lane(&[1000.0, 2000.0, 3000.0, 4000.0, 5000.0])],
        JudgeConfig::default(),
    );
    let id = snare_id();
    board.register_hit(&id, 1000.0);
    board.register_hit(&id, 1900.0);
    board.register_hit(&id, 3100.0);
    board.register_hit(&id, 4500.0);
    board.notes_finished(&[NoteRef { lane: 0, note: 3 }]);

    let summary = board.summary();
    assert_eq!(
        summary,
        ScoreSummary {
            hit: 1,
            rushed: 1,
            dragged: 1,
            missed: 1,
            pending: 1,
            strays: 1,
        }
    );
    assert_eq!(summary.judged(), 4);
}

#[test]
fn scoreboard_follows_song_lane_order() {
    let mut file = MidiFile::new(480);
    let on = |tick, note| {
        TimedEvent::channel(
            tick,
            ChannelMessage::new(9, ChannelEvent::NoteOn { note, velocity: 100 }),
        )
    };
    let off = |tick, note| {
        TimedEvent::channel(
            tick,
            ChannelMessage::new(9, ChannelEvent::NoteOff { note, velocity: 0 }),
        )
    };
    file.tracks.push(RawTrack {
        name: Some("Drums".to_string()),
        instrument_names: Vec::new(),
        events: vec![on(0, 36), off(120, 36), on(960, 38), off(1080, 38)],
    });
    let song = Song::build(
        &file,
        SongOptions {
            reduce_articulations: true,
        },
    );
    let board = Scoreboard::from_song(&song, JudgeConfig::default());

    assert_eq!(board.lane_count(), 2);
    // Tick 960 at 120 bpm is 1000ms.
    let outcome = board.register_hit(&snare_id(), 1040.0);
    assert!(matches!(
        outcome,
        Some(HitOutcome::Matched {
            state: HitState::Hit,
            ..
        })
    ));

    let snare_ref = song
        .events()
        .iter()
        .find_map(|e| e.note.filter(|_| e.message.event.note() == Some(38)))
        .expect("snare note-on");
    assert_eq!(board.note_state(snare_ref).map(|s| s.0), Some(HitState::Hit));
}
