use crate::model::{Tempo, TimeSignature};
use crate::tempo::TempoMap;
use drumline_ports::types::{Millis, Tick};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    /// 1-based bar number.
    pub index: u32,
    pub start_tick: Tick,
    pub end_tick: Tick,
    pub start_ms: Millis,
    pub end_ms: Millis,
    pub time_signature: TimeSignature,
    pub tempo: Tempo,
}

/// Inner beat line of a bar (the downbeat is the bar line itself).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatLine {
    pub measure_index: u32,
    pub beat_index: u32,
    pub tick: Tick,
    pub ms: Millis,
}

impl Measure {
    pub fn length_ms(&self) -> Millis {
        self.end_ms - self.start_ms
    }

    pub fn length_ticks(&self) -> Tick {
        self.end_tick - self.start_tick
    }

    /// `numerator - 1` beat lines spread evenly in ticks over the bar.
    pub fn beats(&self, tempo_map: &TempoMap) -> Vec<BeatLine> {
        let beats = self.time_signature.numerator as Tick;
        if beats <= 1 {
            return Vec::new();
        }

        let length = self.length_ticks();
        (1..beats)
            .map(|b| {
                let tick = self.start_tick + length * b / beats;
                BeatLine {
                    measure_index: self.index,
                    beat_index: b as u32,
                    tick,
                    ms: tempo_map.ticks_to_ms(tick),
                }
            })
            .collect()
    }
}

/// Splits `[0, end_tick)` into bars.
///
/// Each bar samples the signature and tempo at its own start tick only, so a
/// change placed inside a bar takes effect at the next bar line. Files with a
/// signature change off the bar grid therefore get a shifted grid from that
/// point on; this is a known approximation and is kept as is.
pub fn extract_measures(tempo_map: &TempoMap, end_tick: Tick) -> Vec<Measure> {
    let mut measures = Vec::new();
    let mut current_tick: Tick = 0;
    let mut index: u32 = 1;

    while current_tick < end_tick {
        let time_signature = tempo_map.time_signature_at(current_tick);
        let tempo = tempo_map.tempo_at(current_tick);
        let bar_length = tempo_map.bar_length_ticks(time_signature);
        let next_tick = (current_tick + bar_length).min(end_tick);

        measures.push(Measure {
            index,
            start_tick: current_tick,
            end_tick: next_tick,
            start_ms: tempo_map.ticks_to_ms(current_tick),
            end_ms: tempo_map.ticks_to_ms(next_tick),
            time_signature,
            tempo,
        });

        current_tick = next_tick;
        index += 1;
    }

    measures
}

/// All inner beat lines of `measures`, in time order.
pub fn beat_grid(measures: &[Measure], tempo_map: &TempoMap) -> Vec<BeatLine> {
    measures
        .iter()
        .flat_map(|measure| measure.beats(tempo_map))
        .collect()
}
