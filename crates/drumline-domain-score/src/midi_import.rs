use crate::model::{
    EventKind, MidiFile, RawTrack, SignaturePoint, TempoPoint, TimeSignature, TimedEvent,
};
use drumline_ports::midi::{ChannelEvent, ChannelMessage};
use drumline_ports::types::Tick;
use log::debug;
use midly::{Fps, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum MidiImportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
}

pub fn import_midi_path(path: &Path) -> Result<MidiFile, MidiImportError> {
    let data = std::fs::read(path).map_err(|e| MidiImportError::Io(e.to_string()))?;
    let mut file = import_midi_bytes(&data)?;
    if file.title.is_none() {
        file.title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned());
    }
    Ok(file)
}

pub fn import_midi_bytes(data: &[u8]) -> Result<MidiFile, MidiImportError> {
    let smf = Smf::parse(data).map_err(|e| MidiImportError::Parse(e.to_string()))?;
    let (ppq, tempo_override) = match smf.header.timing {
        Timing::Metrical(ticks) => (ticks.as_int(), None),
        Timing::Timecode(fps, ticks_per_frame) => {
            let (ppq, us_per_quarter) = timecode_ppq_and_tempo(fps, ticks_per_frame);
            (ppq, Some(us_per_quarter))
        }
    };

    let mut file = MidiFile::new(ppq);

    for track in &smf.tracks {
        let mut raw = RawTrack::default();
        let mut tick: Tick = 0;
        for event in track {
            tick += event.delta.as_int() as Tick;
            match &event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let message = ChannelMessage::new(channel.as_int(), convert_message(message));
                    raw.events.push(TimedEvent::channel(tick, message));
                }
                TrackEventKind::Meta(meta) => {
                    match meta {
                        MetaMessage::Tempo(us_per_quarter) => file.tempo_points.push(TempoPoint {
                            tick,
                            us_per_quarter: us_per_quarter.as_int(),
                        }),
                        MetaMessage::TimeSignature(numerator, denominator_pow, _, _) => {
                            file.signature_points.push(SignaturePoint {
                                tick,
                                signature: TimeSignature::new(
                                    *numerator,
                                    denominator_from_pow(*denominator_pow),
                                ),
                            })
                        }
                        MetaMessage::TrackName(bytes) if raw.name.is_none() => {
                            raw.name = decode_text(bytes);
                        }
                        MetaMessage::InstrumentName(bytes) => {
                            if let Some(name) = decode_text(bytes) {
                                raw.instrument_names.push(name);
                            }
                        }
                        _ => {}
                    }
                    raw.events.push(TimedEvent {
                        tick,
                        kind: EventKind::Meta,
                    });
                }
                TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => {
                    raw.events.push(TimedEvent {
                        tick,
                        kind: EventKind::SysEx,
                    });
                }
            }
        }
        file.tracks.push(raw);
    }

    if let Some(us_per_quarter) = tempo_override {
        file.tempo_points = vec![TempoPoint {
            tick: 0,
            us_per_quarter,
        }];
    }

    debug!(
        "Imported {} tracks at ppq {} ({} tempo changes, {} signature changes)",
        file.tracks.len(),
        file.ppq,
        file.tempo_points.len(),
        file.signature_points.len()
    );

    Ok(file)
}

fn convert_message(message: &MidiMessage) -> ChannelEvent {
    match *message {
        MidiMessage::NoteOn { key, vel } => ChannelEvent::NoteOn {
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::NoteOff { key, vel } => ChannelEvent::NoteOff {
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::Aftertouch { key, vel } => ChannelEvent::KeyPressure {
            note: key.as_int(),
            pressure: vel.as_int(),
        },
        MidiMessage::Controller { controller, value } => ChannelEvent::ControlChange {
            controller: controller.as_int(),
            value: value.as_int(),
        },
        MidiMessage::ProgramChange { program } => ChannelEvent::ProgramChange {
            program: program.as_int(),
        },
        MidiMessage::ChannelAftertouch { vel } => ChannelEvent::ChannelPressure {
            pressure: vel.as_int(),
        },
        MidiMessage::PitchBend { bend } => ChannelEvent::PitchBend {
            value: bend.0.as_int(),
        },
    }
}

/// Denominator stored as a power of two; out-of-range exponents fall back to quarters.
fn denominator_from_pow(pow: u8) -> u8 {
    match pow {
        0..=7 => 1u8 << pow,
        _ => 4,
    }
}

fn decode_text(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn timecode_ppq_and_tempo(fps: Fps, ticks_per_frame: u8) -> (u16, u32) {
    let ticks_per_frame = ticks_per_frame.max(1) as u16;
    match fps {
        Fps::Fps24 => (24 * ticks_per_frame, 1_000_000),
        Fps::Fps25 => (25 * ticks_per_frame, 1_000_000),
        Fps::Fps30 => (30 * ticks_per_frame, 1_000_000),
        Fps::Fps29 => (30 * ticks_per_frame, 1_001_000),
    }
}
