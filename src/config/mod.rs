use crate::error::{EnvError, Result};
use crate::models::SettingsDocument;
use camino::{Utf8Path, Utf8PathBuf};
use json_comments::StripComments;
use std::fs;

pub mod options;

pub use options::RuntimeOptions;

/// Suffix appended (repeatedly) to the settings path to form backup names
pub const BACKUP_SUFFIX: &str = ".bak";

/// How a [`LoadedSettings`] document was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsSource {
    /// Decoded from the existing file
    Loaded,
    /// No file existed; defaults were written to disk
    CreatedDefault,
    /// The file could not be decoded; defaults are used in memory only.
    ///
    /// `backup` is the copy of the corrupt file, or `None` when the copy failed.
    Recovered {
        reason: String,
        backup: Option<Utf8PathBuf>,
    },
}

/// A settings document ready for use, plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub document: SettingsDocument,
    pub source: SettingsSource,
}

/// Loads and saves the settings document.
///
/// The on-disk format is indented JSON with PascalCase keys. Comments in the
/// file are ignored on read and named options match regardless of case.
///
/// A corrupt document never fails the load: the original file is left in
/// place, copied to the first free name in its backup chain
/// (`settings.json.bak`, `settings.json.bak.bak`, ...), and defaults are used
/// for the current run.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: Utf8PathBuf,
}

impl SettingsStore {
    pub fn new<P: AsRef<Utf8Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Load the settings document.
    ///
    /// # Returns
    /// The normalized document with session-scoped options reset
    ///
    /// # Errors
    /// Only filesystem failures: reading an existing file, or writing the
    /// first-run default file.
    pub fn load(&self) -> Result<LoadedSettings> {
        if !self.path.exists() {
            tracing::warn!(
                "Settings file not found at {}, writing defaults",
                self.path
            );
            let document = finalize(SettingsDocument::default());
            self.save(&document)?;
            return Ok(LoadedSettings {
                document,
                source: SettingsSource::CreatedDefault,
            });
        }

        // Raw bytes: invalid UTF-8 is corruption, not an I/O failure
        let contents = fs::read(&self.path).map_err(|source| EnvError::ReadSettings {
            path: self.path.clone(),
            source,
        })?;

        match decode(&contents) {
            Ok(Some(document)) => {
                tracing::info!("Loaded settings from {}", self.path);
                Ok(LoadedSettings {
                    document: finalize(document),
                    source: SettingsSource::Loaded,
                })
            }
            Ok(None) => Ok(self.recover("document is null".to_string())),
            Err(e) => Ok(self.recover(e.to_string())),
        }
    }

    /// Save a settings document with stable key order and indentation.
    pub fn save(&self, document: &SettingsDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;

        fs::write(&self.path, json).map_err(|source| EnvError::WriteSettings {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!("Saved settings to {}", self.path);
        Ok(())
    }

    fn recover(&self, reason: String) -> LoadedSettings {
        tracing::error!("Failed to read settings from {}: {}", self.path, reason);

        let backup = match self.backup() {
            Ok(backup) => {
                tracing::warn!("Corrupt settings preserved at {}", backup);
                Some(backup)
            }
            Err(e) => {
                tracing::warn!("Could not back up corrupt settings {}: {}", self.path, e);
                None
            }
        };

        LoadedSettings {
            document: SettingsDocument::default(),
            source: SettingsSource::Recovered { reason, backup },
        }
    }

    fn backup(&self) -> std::io::Result<Utf8PathBuf> {
        let target = next_backup_path(&self.path);
        fs::copy(&self.path, &target)?;
        Ok(target)
    }
}

/// First name in the backup chain of `path` that does not exist yet.
pub fn next_backup_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut candidate = format!("{}{}", path, BACKUP_SUFFIX);
    while Utf8Path::new(&candidate).exists() {
        candidate.push_str(BACKUP_SUFFIX);
    }
    Utf8PathBuf::from(candidate)
}

fn decode(contents: &[u8]) -> serde_json::Result<Option<SettingsDocument>> {
    serde_json::from_reader(StripComments::new(contents))
}

fn finalize(mut document: SettingsDocument) -> SettingsDocument {
    document.reset_session_state();
    document.normalize();
    document
}
