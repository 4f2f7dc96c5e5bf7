use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::scheduler::FLOOR_DELAY;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("reading settings from {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("parsing settings from {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootSettings {
    /// Minimum pause between ticks, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_time: Option<u64>,
}

/// User settings as written by the settings window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub root: RootSettings,
    /// Per-module values keyed by module name, then setting id.
    #[serde(default)]
    pub scripts: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A missing file falls back to defaults; a malformed one is an error.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        match Self::load(path) {
            Err(SettingsError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "[ayaya_engine::settings] {} not found; using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.root
            .reading_time
            .map(Duration::from_millis)
            .unwrap_or(FLOOR_DELAY)
    }

    pub fn value(&self, module: &str, id: &str) -> Option<&Value> {
        self.scripts.get(module)?.get(id)
    }

    pub fn toggle(&self, module: &str, id: &str) -> Option<bool> {
        self.value(module, id)?.as_bool()
    }
}
