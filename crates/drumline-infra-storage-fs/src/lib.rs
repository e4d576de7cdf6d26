use drumline_ports::storage::{SettingsDto, StorageError, StoragePort};
use log::debug;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "drumline";
const SETTINGS_FILE: &str = "settings.json";

fn io_err(err: std::io::Error) -> StorageError {
    StorageError::Io(err.to_string())
}

fn serde_err(err: serde_json::Error) -> StorageError {
    StorageError::Serde(err.to_string())
}

/// Settings kept as pretty-printed JSON in a single file.
pub struct FsStorage {
    settings_path: PathBuf,
}

impl FsStorage {
    /// Keeps `settings.json` inside `base_dir`.
    pub fn new(base_dir: PathBuf) -> Self {
        Self::with_path(base_dir.join(SETTINGS_FILE))
    }

    pub fn with_path(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }

    pub fn default_base_dir() -> Result<PathBuf, StorageError> {
        dirs_next::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| StorageError::Io("no user config directory".to_string()))
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }
}

impl Default for FsStorage {
    fn default() -> Self {
        Self::new(Self::default_base_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(err)),
    };
    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(serde_err)
}

/// Writes next to the target, then renames over it.
fn store_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let staging = path.with_extension("json.tmp");
    {
        let mut out = BufWriter::new(File::create(&staging).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut out, value).map_err(serde_err)?;
        out.flush().map_err(io_err)?;
    }
    fs::rename(&staging, path).map_err(io_err)
}

impl StoragePort for FsStorage {
    fn load_settings(&self) -> Result<SettingsDto, StorageError> {
        match load_json(&self.settings_path)? {
            Some(settings) => Ok(settings),
            None => {
                debug!(
                    "No settings at '{}', using defaults",
                    self.settings_path.display()
                );
                Ok(SettingsDto::default())
            }
        }
    }

    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError> {
        store_json(&self.settings_path, s)?;
        debug!("Settings saved to '{}'", self.settings_path.display());
        Ok(())
    }
}
