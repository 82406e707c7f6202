//! Persistent shell configuration.
//!
//! Stored in `~/.lsh/config.json`. Every field has a default, so a partial
//! or missing file is fine.
//!
//! # Example
//!
//! ```no_run
//! use lsh_core::config::ShellConfig;
//!
//! let config = ShellConfig::load();
//! if config.case_sensitive {
//!     println!("command names are case-sensitive");
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

const CONFIG_FILENAME: &str = "config.json";

/// `~/.lsh`, or `None` when there is no home directory.
pub fn lsh_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lsh"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Match command names exactly instead of ignoring case.
    pub case_sensitive: bool,
    /// Expand `$name` in command lines.
    pub variable_substitution: bool,
    /// Register the built-in commands at startup.
    pub auto_register: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            variable_substitution: true,
            auto_register: true,
        }
    }
}

impl ShellConfig {
    /// Load from `~/.lsh/config.json`, falling back to defaults.
    pub fn load() -> Self {
        match lsh_dir() {
            Some(dir) => Self::load_from(&dir.join(CONFIG_FILENAME)),
            None => Self::default(),
        }
    }

    /// Load from `path`. A missing or unparsable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring malformed config");
            Self::default()
        })
    }

    pub fn save(&self) -> std::io::Result<()> {
        let dir = lsh_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no home directory")
        })?;
        std::fs::create_dir_all(&dir)?;
        self.save_to(&dir.join(CONFIG_FILENAME))
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
