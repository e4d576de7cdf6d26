use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the MIDI file to practice.
    pub midi: PathBuf,

    /// Print the song layout (tracks, lanes, measures) and exit.
    #[arg(short, long, default_value_t = false)]
    pub dry_run: bool,

    /// Settings file to use instead of the one in the user config dir.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Playback speed multiplier, clamped to 0.1..=4.0.
    #[arg(short, long)]
    pub speed: Option<f64>,

    /// Repeat the song (or the range) until interrupted.
    #[arg(short = 'l', long = "loop")]
    pub loop_enabled: bool,

    /// Channels (0-15) to leave silent, comma separated.
    #[arg(short, long, value_delimiter = ',', value_parser = clap::value_parser!(u8).range(0..16))]
    pub mute: Vec<u8>,

    /// Only play between these two song positions, in milliseconds.
    #[arg(long, num_args = 2, value_names = ["START_MS", "END_MS"])]
    pub range: Option<Vec<f64>>,

    /// Give every raw note number its own lane instead of grouping by kit piece.
    #[arg(long, default_value_t = false)]
    pub raw_notes: bool,

    /// Write the effective settings back to the settings file.
    #[arg(long, default_value_t = false)]
    pub save_settings: bool,
}
