use crate::song::Lane;
use drumline_ports::types::Millis;

/// Target footprint of a full-beat note on the highway.
pub const PERFECT_WIDTH_MS: Millis = 75.0;
/// Minimum gap left between footprints of neighbouring notes.
pub const MIN_MARGIN_MS: Millis = 15.0;

/// Assigns `rect_start_ms` / `width_ms` to every note of one lane.
///
/// Notes must be sorted by start time. A note's half-width is the smallest
/// of its beat-scaled ideal and half of the gap (minus margin) to each
/// neighbour, so adjacent footprints never overlap.
pub fn solve_note_widths(lane: &mut Lane) {
    let half_widths: Vec<Millis> = (0..lane.notes.len())
        .map(|i| {
            let note = &lane.notes[i];
            let mut half_width = PERFECT_WIDTH_MS / 2.0 * note.beat_fraction;
            if let Some(prev) = lane.previous(i) {
                half_width = half_width.min(neighbour_limit(note.start_ms - prev.start_ms));
            }
            if let Some(next) = lane.next(i) {
                half_width = half_width.min(neighbour_limit(next.start_ms - note.start_ms));
            }
            half_width.max(0.0)
        })
        .collect();

    for (note, half_width) in lane.notes.iter_mut().zip(half_widths) {
        note.width_ms = half_width * 2.0;
        note.rect_start_ms = note.start_ms - half_width;
    }
}

fn neighbour_limit(distance: Millis) -> Millis {
    (distance - MIN_MARGIN_MS) / 2.0
}
