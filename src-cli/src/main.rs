mod args;
mod sink;

use anyhow::Result;
use args::Args;
use clap::Parser;
use drumline_core::{AppCore, Event, SystemClock};
use drumline_domain_score::{import_midi_path, Song, SongOptions};
use drumline_infra_storage_fs::FsStorage;
use drumline_ports::storage::{SettingsDto, StoragePort};
use log::{debug, info, warn};
use sink::LoggingSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let storage = match &args.settings {
        Some(path) => FsStorage::with_path(path.clone()),
        None => FsStorage::default(),
    };
    let settings = effective_settings(&args, &storage);
    if args.save_settings {
        storage.save_settings(&settings)?;
        info!("Settings written to '{}'", storage.settings_path().display());
    }

    if args.dry_run {
        let file = import_midi_path(&args.midi)?;
        let song = Song::build(
            &file,
            SongOptions {
                reduce_articulations: settings.reduce_articulations,
            },
        );
        describe(&song);
        return Ok(());
    }

    let sink = Arc::new(LoggingSink::default());
    let mut app = AppCore::with_settings(
        Arc::new(SystemClock::new()),
        sink.clone(),
        None,
        settings,
    );
    let events = app.subscribe();
    app.load(&args.midi)?;
    if let Some(&[start, end]) = args.range.as_deref() {
        let position = app.set_range(Some((start, end)));
        info!("Practice range set, starting at {:.1}ms", position);
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, stopping playback");
        flag.store(true, Ordering::SeqCst);
    })?;

    let mut positions = app.take_position_stream();
    app.start()?;

    let mut finished = false;
    while !finished && !interrupted.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);

        if let Some(positions) = positions.as_mut() {
            let mut latest = None;
            while let Ok(position) = positions.pop() {
                latest = Some(position);
            }
            if let Some(position) = latest {
                debug!("Position {:.1}ms", position);
            }
        }

        for event in events.try_iter() {
            match event {
                Event::PlaybackStateChanged { playing: false } => finished = true,
                Event::SinkError { message } => warn!("Output error: {}", message),
                Event::ScoreUpdated { summary } => debug!("Score {:?}", summary),
                other => debug!("{:?}", other),
            }
        }
    }

    app.stop()?;
    let summary = app.summary();
    info!(
        "Done: {} messages sent, {} hit, {} rushed, {} dragged, {} missed, {} stray",
        sink.sent(),
        summary.hit,
        summary.rushed,
        summary.dragged,
        summary.missed,
        summary.strays
    );
    Ok(())
}

/// Stored settings with command-line overrides applied on top.
fn effective_settings(args: &Args, storage: &FsStorage) -> SettingsDto {
    let mut settings = match storage.load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            warn!("Failed to load settings, using defaults: {}", err);
            SettingsDto::default()
        }
    };
    if let Some(speed) = args.speed {
        settings.speed = speed;
    }
    if args.loop_enabled {
        settings.loop_enabled = true;
    }
    if !args.mute.is_empty() {
        settings.muted_channels = args.mute.clone();
    }
    if args.raw_notes {
        settings.reduce_articulations = false;
    }
    settings
}

fn describe(song: &Song) {
    info!(
        "'{}': {:.1}ms, {} measures, {} beat lines, {} events",
        song.title().unwrap_or("<untitled>"),
        song.length_ms(),
        song.measures().len(),
        song.beat_grid().len(),
        song.events().len()
    );
    for channel in song.channels() {
        for track in &channel.tracks {
            info!(
                "ch{} track {} '{}'{}: {} notes",
                channel.id + 1,
                track.index,
                track.name,
                if track.is_likely_drum { " [drums]" } else { "" },
                track.note_count()
            );
            for lane in &track.lanes {
                info!("    {:<24} {} notes", lane.name, lane.notes.len());
            }
        }
    }
    if let Some(track) = song.primary_track() {
        info!("Primary track: '{}'", track.name);
    }
}
