// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the configuration file that notedot uses to
//! simplify the process of serialization and deserialization. File I/O is
//! left to the caller to figure out.
//!
//! # General Layout
//!
//! The configuration file only has a settings section. Every field in it is
//! optional:
//!
//! ```toml
//! [settings]
//! home = "$HOME"
//! namespace_root = "dotfiles"
//! store = "$XDG_DATA_HOME/notedot/store.toml"
//! exclude = [".ssh", ".gnupg"]
//! ```
//!
//! Paths undergo shell expansion when parsed.

use crate::reconcile::namespace::DEFAULT_ROOT;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Configuration file layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Settings for reconciliation.
    #[serde(default)]
    pub settings: Settings,
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        let settings = &mut config.settings;
        settings.home = settings.home.as_deref().map(expand).transpose()?;
        settings.store = settings.store.as_deref().map(expand).transpose()?;
        settings.exclude = settings
            .exclude
            .iter()
            .map(|path| expand(path))
            .collect::<Result<Vec<_>>>()?;

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Reconciliation settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Home directory that tracked paths are relative to.
    pub home: Option<PathBuf>,

    /// Title of the tag all tracked items live under.
    pub namespace_root: String,

    /// Path to local store file.
    pub store: Option<PathBuf>,

    /// Paths that sync should never touch.
    pub exclude: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: None,
            namespace_root: DEFAULT_ROOT.into(),
            store: None,
            exclude: Vec::new(),
        }
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned()
        .into())
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
