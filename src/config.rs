//! Configuration management
//!
//! Settings live in a JSON file. `MYTHTV_SETTINGS` names the file to use;
//! otherwise `<config dir>/mythtv_cli/settings.json` is tried, and if that
//! is absent or unreadable the packaged defaults apply.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{MythError, Result};

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "MYTHTV_SETTINGS";

pub const DEFAULT_HOSTNAME: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6544;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// XMLTV callsign -> backend callsign(s)
    #[serde(default)]
    pub xmltv_callsigns: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_tmp_dirs")]
    pub tmp_dirs: Vec<PathBuf>,
    #[serde(default = "default_tmp_dir_name")]
    pub tmp_dir_name: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Timeout for remote calls. None blocks until the backend answers.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Set when the values came from a file rather than the defaults.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

fn default_hostname() -> String {
    DEFAULT_HOSTNAME.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_tmp_dir_name() -> String {
    "MythTV_CLI".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_tmp_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(cache) = dirs::cache_dir() {
        dirs.push(cache);
    }
    dirs.push(std::env::temp_dir());
    dirs
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            xmltv_callsigns: BTreeMap::new(),
            tmp_dirs: default_tmp_dirs(),
            tmp_dir_name: default_tmp_dir_name(),
            log_filter: default_log_filter(),
            timeout_secs: None,
            loaded_from: None,
        }
    }
}

impl Settings {
    /// Path of the settings file this process should use.
    pub fn settings_path() -> PathBuf {
        if let Some(path) = std::env::var_os(SETTINGS_ENV) {
            return PathBuf::from(path);
        }
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("mythtv_cli");
        path.push("settings.json");
        path
    }

    /// Load settings, falling back to the defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::settings_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(mut settings) => {
                    settings.loaded_from = Some(path.to_path_buf());
                    return settings;
                }
                Err(e) => warn!("Ignoring unreadable settings file {}: {}", path.display(), e),
            },
            Err(e) => warn!("Unable to read settings file {}: {}", path.display(), e),
        }

        Self::default()
    }

    /// Write the settings as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MythError::Settings(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Directory used for the WSDL cache.
    ///
    /// The first candidate in `tmp_dirs` that exists wins; the
    /// `tmp_dir_name` subdirectory is created inside it if needed.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        for candidate in &self.tmp_dirs {
            if !candidate.is_dir() {
                continue;
            }
            let dir = candidate.join(&self.tmp_dir_name);
            if !dir.is_dir() {
                fs::create_dir_all(&dir)?;
            }
            debug!("got tmp dir = {}", dir.display());
            return Ok(dir);
        }

        let tried = self
            .tmp_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(MythError::TmpDir { tried })
    }
}
