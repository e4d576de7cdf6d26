use drumline_infra_storage_fs::FsStorage;
use drumline_ports::storage::{SettingsDto, StorageError, StoragePort};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("drumline-fs-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn missing_file_yields_defaults() {
    let storage = FsStorage::new(scratch_dir("missing"));
    assert_eq!(storage.load_settings().unwrap(), SettingsDto::default());
}

#[test]
fn saved_settings_load_back() {
    let dir = scratch_dir("saved");
    let storage = FsStorage::new(dir.join("nested"));
    let settings = SettingsDto {
        reduce_articulations: false,
        visual_latency_ms: 42.5,
        input_offset_ms: -8.0,
        speed: 0.75,
        loop_enabled: true,
        tick_interval_us: 500,
        muted_channels: vec![0, 9],
    };
    storage.save_settings(&settings).unwrap();
    assert!(storage.settings_path().exists());
    assert_eq!(storage.load_settings().unwrap(), settings);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = scratch_dir("partial");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("custom.json");
    fs::write(&path, r#"{ "loop_enabled": true }"#).unwrap();

    let loaded = FsStorage::with_path(path).load_settings().unwrap();
    assert!(loaded.loop_enabled);
    assert!(loaded.reduce_articulations);
    assert_eq!(loaded.speed, 1.0);
    assert_eq!(loaded.tick_interval_us, 1_000);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn corrupt_file_is_a_serde_error() {
    let dir = scratch_dir("corrupt");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("settings.json"), b"not json").unwrap();

    let err = FsStorage::new(dir.clone()).load_settings().unwrap_err();
    assert!(matches!(err, StorageError::Serde(_)));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn saving_leaves_no_staging_file() {
    let dir = scratch_dir("staging");
    let storage = FsStorage::new(dir.clone());
    storage.save_settings(&SettingsDto::default()).unwrap();
    storage.save_settings(&SettingsDto::default()).unwrap();

    let names: Vec<String> = fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["settings.json".to_string()]);
    let _ = fs::remove_dir_all(dir);
}
