use crate::model::{SignaturePoint, Tempo, TempoPoint, TimeSignature, DEFAULT_US_PER_QUARTER};
use drumline_ports::types::{Millis, Tick};
use std::collections::BTreeMap;

/// Piecewise-constant tempo and time-signature map over a file's ticks.
///
/// Both change lists are sorted by tick with one entry per tick; when the
/// source carries several changes at the same tick the last one wins.
#[derive(Clone, Debug)]
pub struct TempoMap {
    ppq: u16,
    segments: Vec<TempoSegment>,
    signatures: Vec<SignaturePoint>,
}

#[derive(Clone, Copy, Debug)]
struct TempoSegment {
    start_tick: Tick,
    start_ms: Millis,
    us_per_quarter: u32,
}

impl TempoMap {
    pub fn new(
        ppq: u16,
        tempo_points: Vec<TempoPoint>,
        signature_points: Vec<SignaturePoint>,
    ) -> Self {
        let ppq = ppq.max(1);

        let mut tempos: BTreeMap<Tick, u32> = BTreeMap::new();
        for point in tempo_points {
            tempos.insert(point.tick.max(0), point.us_per_quarter.max(1));
        }
        tempos.entry(0).or_insert(DEFAULT_US_PER_QUARTER);

        let mut segments: Vec<TempoSegment> = Vec::with_capacity(tempos.len());
        for (tick, us_per_quarter) in tempos {
            let start_ms = match segments.last() {
                Some(prev) => prev.start_ms + ticks_to_ms(tick - prev.start_tick, prev.us_per_quarter, ppq),
                None => 0.0,
            };
            segments.push(TempoSegment {
                start_tick: tick,
                start_ms,
                us_per_quarter,
            });
        }

        let mut signatures: BTreeMap<Tick, TimeSignature> = BTreeMap::new();
        for point in signature_points {
            signatures.insert(point.tick.max(0), point.signature);
        }
        let signatures = signatures
            .into_iter()
            .map(|(tick, signature)| SignaturePoint { tick, signature })
            .collect();

        Self {
            ppq,
            segments,
            signatures,
        }
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn ticks_to_ms(&self, tick: Tick) -> Millis {
        let seg = self.segment_for_tick(tick);
        seg.start_ms + ticks_to_ms(tick - seg.start_tick, seg.us_per_quarter, self.ppq)
    }

    pub fn ms_to_ticks(&self, ms: Millis) -> Tick {
        let seg = self.segment_for_ms(ms);
        let delta_ticks = (ms - seg.start_ms) * 1000.0 * self.ppq as f64 / seg.us_per_quarter as f64;
        seg.start_tick + delta_ticks.round() as Tick
    }

    /// Tempo of the most recent change at or before `tick`.
    pub fn tempo_at(&self, tick: Tick) -> Tempo {
        Tempo {
            us_per_quarter: self.segment_for_tick(tick).us_per_quarter,
        }
    }

    /// Time signature of the most recent change at or before `tick`, 4/4 before the first.
    pub fn time_signature_at(&self, tick: Tick) -> TimeSignature {
        let idx = self.signatures.partition_point(|point| point.tick <= tick);
        match idx {
            0 => TimeSignature::COMMON,
            n => self.signatures[n - 1].signature,
        }
    }

    /// numerator × (ppq × 4 / denominator)
    pub fn bar_length_ticks(&self, signature: TimeSignature) -> Tick {
        let beat = self.ppq as Tick * 4 / signature.denominator.max(1) as Tick;
        (beat * signature.numerator as Tick).max(1)
    }

    pub fn tempo_points(&self) -> Vec<TempoPoint> {
        self.segments
            .iter()
            .map(|seg| TempoPoint {
                tick: seg.start_tick,
                us_per_quarter: seg.us_per_quarter,
            })
            .collect()
    }

    pub fn signature_points(&self) -> &[SignaturePoint] {
        &self.signatures
    }

    fn segment_for_tick(&self, tick: Tick) -> TempoSegment {
        let idx = self.segments.partition_point(|seg| seg.start_tick <= tick);
        self.segments[idx.saturating_sub(1)]
    }

    fn segment_for_ms(&self, ms: Millis) -> TempoSegment {
        let idx = self.segments.partition_point(|seg| seg.start_ms <= ms);
        self.segments[idx.saturating_sub(1)]
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(480, Vec::new(), Vec::new())
    }
}

fn ticks_to_ms(ticks: Tick, us_per_quarter: u32, ppq: u16) -> Millis {
    ticks as f64 * us_per_quarter as f64 / ppq as f64 / 1000.0
}
