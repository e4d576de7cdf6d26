use crate::judge::{judge_hit, mark_missed, HitOutcome, JudgeConfig};
use drumline_domain_score::{HitState, Lane, LaneId, NoteRef, Song};
use drumline_ports::types::Millis;
use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub hit: u32,
    pub rushed: u32,
    pub dragged: u32,
    pub missed: u32,
    pub pending: u32,
    pub strays: u32,
}

impl ScoreSummary {
    pub fn judged(&self) -> u32 {
        self.hit + self.rushed + self.dragged + self.missed
    }
}

#[derive(Debug)]
struct LaneBoard {
    lane: Lane,
    strays: Vec<Millis>,
}

/// Scoring state of every lane, one lock per lane.
///
/// Hits arrive from the input thread and misses from the dispatch thread;
/// each mutation holds only the lock of the lane it touches.
pub struct Scoreboard {
    cfg: JudgeConfig,
    lanes: Vec<Mutex<LaneBoard>>,
    index: HashMap<LaneId, usize>,
}

impl Scoreboard {
    pub fn new(lanes: Vec<Lane>, cfg: JudgeConfig) -> Self {
        let index = lanes
            .iter()
            .enumerate()
            .map(|(i, lane)| (lane.id, i))
            .collect();
        let lanes = lanes
            .into_iter()
            .map(|lane| {
                Mutex::new(LaneBoard {
                    lane,
                    strays: Vec::new(),
                })
            })
            .collect();
        Self { cfg, lanes, index }
    }

    /// Lanes in the song's flattened order, so `NoteRef`s index directly.
    pub fn from_song(song: &Song, cfg: JudgeConfig) -> Self {
        Self::new(song.lanes().cloned().collect(), cfg)
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), JudgeConfig::default())
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane_index(&self, id: &LaneId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Unknown lanes and lanes without notes are ignored.
    pub fn register_hit(&self, lane: &LaneId, time_ms: Millis) -> Option<HitOutcome> {
        let idx = self.lane_index(lane)?;
        self.register_hit_at(idx, time_ms)
    }

    pub fn register_hit_at(&self, lane_idx: usize, time_ms: Millis) -> Option<HitOutcome> {
        let mut board = self.lanes.get(lane_idx)?.lock();
        let outcome = judge_hit(&mut board.lane, time_ms, &self.cfg)?;
        if let HitOutcome::Stray { time_ms } = outcome {
            debug!("Stray input on {} at {:.1}ms", board.lane.id, time_ms);
            board.strays.push(time_ms);
        }
        Some(outcome)
    }

    /// Marks still-pending notes as missed; returns the lanes that changed.
    pub fn notes_finished(&self, notes: &[NoteRef]) -> BTreeSet<usize> {
        let mut changed = BTreeSet::new();
        for note_ref in notes {
            let Some(board) = self.lanes.get(note_ref.lane) else {
                continue;
            };
            if mark_missed(&mut board.lock().lane, note_ref.note) {
                changed.insert(note_ref.lane);
            }
        }
        changed
    }

    /// Every note back to pending and every stray dropped.
    pub fn reset_all(&self) {
        for board in &self.lanes {
            let mut board = board.lock();
            board.lane.reset_scores();
            board.strays.clear();
        }
    }

    pub fn lane(&self, lane_idx: usize) -> Option<Lane> {
        self.lanes.get(lane_idx).map(|board| board.lock().lane.clone())
    }

    pub fn note_state(&self, note_ref: NoteRef) -> Option<(HitState, Option<Millis>)> {
        let board = self.lanes.get(note_ref.lane)?.lock();
        board
            .lane
            .notes
            .get(note_ref.note)
            .map(|note| (note.state, note.hit_offset_ms))
    }

    pub fn strays(&self, lane_idx: usize) -> Vec<Millis> {
        self.lanes
            .get(lane_idx)
            .map(|board| board.lock().strays.clone())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> ScoreSummary {
        let mut summary = ScoreSummary::default();
        for board in &self.lanes {
            let board = board.lock();
            summary.strays += board.strays.len() as u32;
            for note in &board.lane.notes {
                match note.state {
                    HitState::Pending => summary.pending += 1,
                    HitState::Hit => summary.hit += 1,
                    HitState::Rushed => summary.rushed += 1,
                    HitState::Dragged => summary.dragged += 1,
                    HitState::Missed => summary.missed += 1,
                }
            }
        }
        summary
    }
}
