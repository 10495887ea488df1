//! Utilities for loading and merging metal configuration files.
//!
//! Values are layered, lowest priority first:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. `$HOME/.metal/config.toml`,
//! 3. every `metal.toml` from the filesystem root down to the working directory,
//! 4. `METAL_*` environment variables, e.g. `METAL_RENDER_OUTPUT_DIR`.
#![warn(missing_docs)]

pub mod home;
pub(crate) mod paths;
pub mod raw;
#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::raw::RawConfig;

/// Fully resolved configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Design construction settings.
    pub design: DesignConfig,
    /// Renderer settings.
    pub render: RenderConfig,
    /// Logging settings.
    pub log: LogConfig,
}

/// Design construction settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignConfig {
    /// Replace components whose name is already taken instead of rejecting them.
    pub overwrite_enabled: bool,
    /// A layer stack file (CSV or TOML).
    ///
    /// Relative paths are resolved against the directory of the file that set them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_stack: Option<PathBuf>,
}

/// Renderer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Directory where rendered files are written.
    pub output_dir: PathBuf,
    /// Size chips from the rendered components plus a buffer.
    pub box_plus_buffer: bool,
    /// Buffer added left and right of the components, in millimeters.
    pub x_buffer_width_mm: f64,
    /// Buffer added above and below the components, in millimeters.
    pub y_buffer_width_mm: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            box_plus_buffer: true,
            x_buffer_width_mm: 0.2,
            y_buffer_width_mm: 0.2,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// A `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration for a process running in `cwd` whose metal home
    /// directory is `home`.
    pub fn new(cwd: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Result<Self> {
        RawConfig::new(cwd.into(), home.into()).resolve()
    }

    /// Loads configuration for the current process.
    ///
    /// Uses the current directory and [`home::metal_home`].
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir()
            .with_context(|| "couldn't get the current directory of the process")?;
        let home = home::metal_home()?;
        Self::new(cwd, home)
    }

    /// Parses a single configuration document, applying defaults for missing keys.
    pub fn from_toml(doc: &str, file: &Path) -> Result<Self> {
        let table: toml::Table = doc
            .parse()
            .with_context(|| format!("could not parse `{}` as TOML", file.display()))?;
        let mut config: Config = toml::Value::Table(table)
            .try_into()
            .with_context(|| format!("invalid configuration in `{}`", file.display()))?;
        if let Some(dir) = file.parent() {
            config.resolve_relative_paths(dir);
        }
        Ok(config)
    }

    pub(crate) fn resolve_relative_paths(&mut self, base: &Path) {
        if let Some(path) = self.design.layer_stack.as_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}
