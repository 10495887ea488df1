//! Location of the per-user metal directory.

use std::path::PathBuf;

use anyhow::{anyhow, Result};

/// The environment variable that overrides the metal home directory.
pub const METAL_HOME: &str = "METAL_HOME";

/// Returns the per-user metal directory.
///
/// `$METAL_HOME` takes precedence. Otherwise this is `.metal` inside the
/// user's home directory, taken from `HOME` (or `USERPROFILE` on Windows).
pub fn metal_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(METAL_HOME).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = ["HOME", "USERPROFILE"]
        .iter()
        .find_map(|var| std::env::var_os(var).filter(|v| !v.is_empty()))
        .ok_or_else(|| {
            anyhow!(
                "couldn't find your home directory. \
                 This probably means that $HOME was not set."
            )
        })?;
    Ok(PathBuf::from(home).join(".metal"))
}
