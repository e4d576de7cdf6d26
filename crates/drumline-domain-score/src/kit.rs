use drumline_ports::types::GM_PERCUSSION_CHANNEL;
use serde::{Deserialize, Serialize};

/// Normalised drum voice several General MIDI percussion keys collapse onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KitArticulation {
    Kick,
    Snare,
    HighTom,
    MidTom,
    LowTom,
    OpenHiHat,
    ClosedHiHat,
    PedalHiHat,
    Crash,
    Ride,
    OtherPercussion,
}

impl KitArticulation {
    pub const ALL: [KitArticulation; 11] = [
        KitArticulation::Kick,
        KitArticulation::Snare,
        KitArticulation::HighTom,
        KitArticulation::MidTom,
        KitArticulation::LowTom,
        KitArticulation::OpenHiHat,
        KitArticulation::ClosedHiHat,
        KitArticulation::PedalHiHat,
        KitArticulation::Crash,
        KitArticulation::Ride,
        KitArticulation::OtherPercussion,
    ];

    pub fn from_note(note: u8) -> Self {
        match note {
            35 | 36 => KitArticulation::Kick,
            37 | 38 | 40 => KitArticulation::Snare,
            48 | 50 => KitArticulation::HighTom,
            45 | 47 => KitArticulation::MidTom,
            41 | 43 => KitArticulation::LowTom,
            46 => KitArticulation::OpenHiHat,
            42 => KitArticulation::ClosedHiHat,
            44 => KitArticulation::PedalHiHat,
            49 | 52 | 55 | 57 => KitArticulation::Crash,
            51 | 53 | 59 => KitArticulation::Ride,
            _ => KitArticulation::OtherPercussion,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KitArticulation::Kick => "Kick",
            KitArticulation::Snare => "Snare",
            KitArticulation::HighTom => "High Tom",
            KitArticulation::MidTom => "Mid Tom",
            KitArticulation::LowTom => "Low Tom",
            KitArticulation::OpenHiHat => "Open Hi-Hat",
            KitArticulation::ClosedHiHat => "Closed Hi-Hat",
            KitArticulation::PedalHiHat => "Pedal Hi-Hat",
            KitArticulation::Crash => "Crash",
            KitArticulation::Ride => "Ride",
            KitArticulation::OtherPercussion => "Other Percussion",
        }
    }
}

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// General MIDI percussion key map (channel 10, keys 35..=81).
pub fn gm_drum_name(note: u8) -> Option<&'static str> {
    let name = match note {
        35 => "Acoustic Bass Drum",
        36 => "Bass Drum 1",
        37 => "Side Stick",
        38 => "Acoustic Snare",
        39 => "Hand Clap",
        40 => "Electric Snare",
        41 => "Low Floor Tom",
        42 => "Closed Hi-Hat",
        43 => "High Floor Tom",
        44 => "Pedal Hi-Hat",
        45 => "Low Tom",
        46 => "Open Hi-Hat",
        47 => "Low-Mid Tom",
        48 => "Hi-Mid Tom",
        49 => "Crash Cymbal 1",
        50 => "High Tom",
        51 => "Ride Cymbal 1",
        52 => "Chinese Cymbal",
        53 => "Ride Bell",
        54 => "Tambourine",
        55 => "Splash Cymbal",
        56 => "Cowbell",
        57 => "Crash Cymbal 2",
        58 => "Vibraslap",
        59 => "Ride Cymbal 2",
        60 => "Hi Bongo",
        61 => "Low Bongo",
        62 => "Mute Hi Conga",
        63 => "Open Hi Conga",
        64 => "Low Conga",
        65 => "High Timbale",
        66 => "Low Timbale",
        67 => "High Agogo",
        68 => "Low Agogo",
        69 => "Cabasa",
        70 => "Maracas",
        71 => "Short Whistle",
        72 => "Long Whistle",
        73 => "Short Guiro",
        74 => "Long Guiro",
        75 => "Claves",
        76 => "Hi Wood Block",
        77 => "Low Wood Block",
        78 => "Mute Cuica",
        79 => "Open Cuica",
        80 => "Mute Triangle",
        81 => "Open Triangle",
        _ => return None,
    };
    Some(name)
}

/// Scientific pitch name, middle C (60) = "C4".
pub fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

/// Pitch name, followed by the GM drum name on the percussion channel.
pub fn lane_display_name(note: u8, channel: u8) -> String {
    match gm_drum_name(note) {
        Some(drum) if channel == GM_PERCUSSION_CHANNEL => format!("{} ({})", note_name(note), drum),
        _ => note_name(note),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_gm_only_on_percussion_channel() {
        assert_eq!(lane_display_name(38, 9), "D2 (Acoustic Snare)");
        assert_eq!(lane_display_name(38, 0), "D2");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(0), "C-1");
    }

    #[test]
    fn unknown_keys_fall_into_other_percussion() {
        assert_eq!(KitArticulation::from_note(36), KitArticulation::Kick);
        assert_eq!(KitArticulation::from_note(44), KitArticulation::PedalHiHat);
        assert_eq!(KitArticulation::from_note(81), KitArticulation::OtherPercussion);
        assert_eq!(KitArticulation::from_note(0), KitArticulation::OtherPercussion);
    }
}
