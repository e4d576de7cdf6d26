use drumline_domain_score::{HitState, Lane, Note};
use drumline_ports::types::Millis;
use serde::{Deserialize, Serialize};

/// Inclusive bound for an on-time hit.
pub const PERFECT_LIMIT_MS: Millis = 75.0;
/// Exclusive bound for any match; further away the input is stray.
pub const IMPERFECT_LIMIT_MS: Millis = 110.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JudgeConfig {
    pub perfect_ms: Millis,
    pub imprecise_ms: Millis,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            perfect_ms: PERFECT_LIMIT_MS,
            imprecise_ms: IMPERFECT_LIMIT_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum HitOutcome {
    Matched {
        note: usize,
        state: HitState,
        offset_ms: Millis,
    },
    Stray {
        time_ms: Millis,
    },
}

/// Grade for `offset = input - note start`, `None` outside the imprecise window.
pub fn classify(offset_ms: Millis, cfg: &JudgeConfig) -> Option<HitState> {
    let distance = offset_ms.abs();
    if distance >= cfg.imprecise_ms {
        return None;
    }
    let state = if distance <= cfg.perfect_ms {
        HitState::Hit
    } else if offset_ms > 0.0 {
        HitState::Dragged
    } else {
        HitState::Rushed
    };
    Some(state)
}

/// Index of the note starting closest to `time_ms`; ties go to the earlier note.
pub fn nearest_note(notes: &[Note], time_ms: Millis) -> Option<usize> {
    if notes.is_empty() {
        return None;
    }

    let idx = notes.partition_point(|note| note.start_ms < time_ms);
    let candidate = match (idx.checked_sub(1), notes.get(idx)) {
        (Some(before), Some(after)) => {
            let before_distance = time_ms - notes[before].start_ms;
            let after_distance = after.start_ms - time_ms;
            if before_distance <= after_distance {
                before
            } else {
                idx
            }
        }
        (Some(before), None) => before,
        (None, _) => idx,
    };

    let start = notes[candidate].start_ms;
    let first = notes[..candidate]
        .iter()
        .rposition(|note| note.start_ms != start)
        .map_or(0, |i| i + 1);
    Some(first)
}

/// Matches one live input against a lane. `None` when the lane has no notes.
pub fn judge_hit(lane: &mut Lane, time_ms: Millis, cfg: &JudgeConfig) -> Option<HitOutcome> {
    let nearest = nearest_note(&lane.notes, time_ms)?;
    let start = lane.notes[nearest].start_ms;

    // Simultaneous notes in a merged lane are consumed one per input.
    let target = lane.notes[nearest..]
        .iter()
        .take_while(|note| note.start_ms == start)
        .position(|note| note.state.is_pending())
        .map(|offset| nearest + offset);

    let offset_ms = time_ms - start;
    match (target, classify(offset_ms, cfg)) {
        (Some(index), Some(state)) => {
            let note = &mut lane.notes[index];
            note.state = state;
            note.hit_offset_ms = Some(offset_ms);
            Some(HitOutcome::Matched {
                note: index,
                state,
                offset_ms,
            })
        }
        _ => Some(HitOutcome::Stray { time_ms }),
    }
}

/// Pending → Missed. Returns whether the note changed.
pub fn mark_missed(lane: &mut Lane, note_index: usize) -> bool {
    match lane.notes.get_mut(note_index) {
        Some(note) if note.state.is_pending() => {
            note.state = HitState::Missed;
            true
        }
        _ => false,
    }
}
