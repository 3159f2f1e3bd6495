//! Saved targets.
//!
//! Targets live in a TOML file, one table per target:
//!
//! ```toml
//! [targets.ci]
//! api = "https://ci.example.com"
//! team = "main"
//! token = "Bearer eyJ..."
//! insecure = false
//! ```

use crate::model::{Target, Token};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const CONFIG_ENV: &str = "FFLY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse target file: {0}")]
    Deserialize(#[from] toml::de::Error),

    #[error("failed to serialize target file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not determine a configuration directory; set {CONFIG_ENV}")]
    NoConfigDir,
}

type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TargetEntry {
    api: String,
    team: String,
    token: Token,
    #[serde(default)]
    insecure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    targets: BTreeMap<String, TargetEntry>,
}

/// `$FFLY_CONFIG`, else `<config dir>/ffly/config.toml`.
pub fn config_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("ffly").join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

impl Config {
    /// A missing file is an empty configuration.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => data.parse(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no target file at {}", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let data = toml::ser::to_string_pretty(self)?;

        // tokens are credentials: owner-only before any byte is written
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(io_err)?;
        #[cfg(unix)]
        {
            // an existing file keeps its old mode on open
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }
        file.write_all(data.as_bytes()).map_err(io_err)?;
        tracing::debug!("saved {} target(s) to {}", self.targets.len(), path.display());
        Ok(())
    }

    pub fn target(&self, name: &str) -> Option<Target> {
        self.targets.get(name).map(|entry| Target {
            name: name.to_string(),
            api: entry.api.clone(),
            team: entry.team.clone(),
            token: entry.token.clone(),
            insecure: entry.insecure,
        })
    }

    /// All targets, ordered by name.
    pub fn targets(&self) -> Vec<Target> {
        self.targets
            .keys()
            .filter_map(|name| self.target(name))
            .collect()
    }

    /// Adds `target`, replacing any saved target of the same name.
    pub fn upsert(&mut self, target: &Target) {
        self.targets.insert(
            target.name.clone(),
            TargetEntry {
                api: target.api.clone(),
                team: target.team.clone(),
                token: target.token.clone(),
                insecure: target.insecure,
            },
        );
    }

    /// Returns whether a target by that name existed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.targets.remove(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Ok(toml::de::from_str(data)?)
    }
}
