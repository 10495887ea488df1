//! Untyped configuration layers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use toml::{Table, Value};

use crate::paths::config_files_outermost_first;
use crate::Config;

/// The name of the per-project configuration file.
pub const PROJECT_FILE_NAME: &str = "metal.toml";
/// The name of the per-user configuration file inside the metal home directory.
pub const HOME_FILE_NAME: &str = "config.toml";
/// The prefix of environment variables that override configuration keys.
pub const ENV_PREFIX: &str = "METAL";

/// Configuration assembled from files and environment variables before it is typed.
#[derive(Debug)]
pub struct RawConfig {
    cwd: PathBuf,
    home: PathBuf,
    stop_root_at: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl RawConfig {
    /// Creates a loader rooted at `cwd` with metal home directory `home`.
    pub fn new(cwd: PathBuf, home: PathBuf) -> Self {
        Self {
            cwd,
            home,
            stop_root_at: None,
            env: None,
        }
    }

    /// Stops the ancestor search after `dir`.
    pub fn stop_root_at(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stop_root_at = Some(dir.into());
        self
    }

    /// Uses a snapshot of environment variables instead of the process environment.
    pub fn set_env(&mut self, env: HashMap<String, String>) {
        self.env = Some(env);
    }

    fn get_env(&self, key: &str) -> Option<String> {
        match &self.env {
            Some(env) => env.get(key).cloned(),
            None => std::env::var(key).ok(),
        }
    }

    /// Configuration files that exist, lowest priority first.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let home_file = self.home.join(HOME_FILE_NAME);
        if home_file.is_file() {
            files.push(home_file);
        }
        for file in config_files_outermost_first(
            &self.cwd,
            self.stop_root_at.as_deref(),
            PROJECT_FILE_NAME,
        ) {
            if !files.contains(&file) {
                files.push(file);
            }
        }
        files
    }

    /// Merges every layer into a single table.
    pub fn load_table(&self) -> Result<Table> {
        let mut table = default_table()?;
        for file in self.files() {
            tracing::debug!(file = %file.display(), "loading configuration file");
            let layer = load_file(&file)?;
            merge(&mut table, layer);
        }
        self.apply_env(&mut table, &mut Vec::new())?;
        Ok(table)
    }

    /// Resolves all layers into a typed [`Config`].
    pub fn resolve(&self) -> Result<Config> {
        let table = self.load_table()?;
        let mut config: Config = Value::Table(table)
            .try_into()
            .with_context(|| "invalid configuration after merging all layers")?;
        if config
            .design
            .layer_stack
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            config.design.layer_stack = None;
        }
        // Env values are relative to the working directory.
        config.resolve_relative_paths(&self.cwd);
        Ok(config)
    }

    fn apply_env(&self, table: &mut Table, prefix: &mut Vec<String>) -> Result<()> {
        for (key, value) in table.iter_mut() {
            prefix.push(key.clone());
            if let Value::Table(inner) = value {
                self.apply_env(inner, prefix)?;
            } else {
                let var = env_key(prefix);
                if let Some(s) = self.get_env(&var) {
                    tracing::debug!(%var, "overriding configuration from environment");
                    *value = parse_env_value(value, &s)
                        .with_context(|| format!("invalid value for environment variable `{var}`"))?;
                }
            }
            prefix.pop();
        }
        Ok(())
    }
}

/// The environment variable name for a key path, e.g. `METAL_RENDER_OUTPUT_DIR`.
pub fn env_key(path: &[String]) -> String {
    let mut key = ENV_PREFIX.to_string();
    for part in path {
        key.push('_');
        key.push_str(&part.to_uppercase().replace('-', "_"));
    }
    key
}

fn parse_env_value(current: &Value, s: &str) -> Result<Value> {
    Ok(match current {
        Value::Boolean(_) => Value::Boolean(
            s.parse()
                .map_err(|_| anyhow!("expected `true` or `false`, found `{s}`"))?,
        ),
        Value::Integer(_) => Value::Integer(s.parse()?),
        Value::Float(_) => Value::Float(s.parse()?),
        _ => Value::String(s.to_string()),
    })
}

fn default_table() -> Result<Table> {
    let Value::Table(mut table) = Value::try_from(Config::default())? else {
        return Err(anyhow!("default configuration is not a table"));
    };
    // Keys absent from the defaults still need a slot for env overrides.
    if let Some(Value::Table(design)) = table.get_mut("design") {
        design
            .entry("layer_stack")
            .or_insert_with(|| Value::String(String::new()));
    }
    Ok(table)
}

fn load_file(file: &Path) -> Result<Table> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read configuration file `{}`", file.display()))?;
    let mut table: Table = contents
        .parse()
        .with_context(|| format!("could not parse `{}` as TOML", file.display()))?;
    if let (Some(dir), Some(Value::Table(design))) = (file.parent(), table.get_mut("design")) {
        if let Some(Value::String(path)) = design.get_mut("layer_stack") {
            let p = Path::new(path.as_str());
            if p.is_relative() && !path.is_empty() {
                *path = dir.join(p).to_string_lossy().into_owned();
            }
        }
    }
    Ok(table)
}

/// Deep-merges `layer` into `base`; values in `layer` win.
pub fn merge(base: &mut Table, layer: Table) {
    for (key, value) in layer {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(b)), Value::Table(l)) => merge(b, l),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
