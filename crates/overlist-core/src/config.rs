use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, warn};

/// Flat key-value configuration with built-in defaults, an optional rc file,
/// and command-line overrides layered on top.
#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Config {
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config {
            map: HashMap::new(),
            loaded_files: vec![],
        };

        cfg.map
            .insert("data.location".to_string(), "~/.overlist".to_string());
        cfg.map.insert("color".to_string(), "on".to_string());

        let rc_path = resolve_rc_path(rc_override)?;
        if let Some(path) = rc_path {
            info!(rc = %path.display(), "loading rc file");
            cfg.load_file(&path)?;
        } else {
            debug!("no rc file found; using defaults");
        }

        Ok(cfg)
    }

    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let table: toml::Table = raw
            .parse()
            .with_context(|| format!("invalid rc file {}", path.display()))?;

        for (key, value) in table {
            let rendered = match value {
                toml::Value::String(s) => s,
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Integer(n) => n.to_string(),
                toml::Value::Float(f) => f.to_string(),
                other => {
                    warn!(key, "unsupported rc value type {}; skipping", other.type_str());
                    continue;
                }
            };
            self.map.insert(key, rendered);
        }

        self.loaded_files.push(path.to_path_buf());
        Ok(())
    }

    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            debug!(key, value, "rc override applied");
            self.map.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let raw = self.map.get(key)?;
        match raw.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => Some(true),
            "off" | "no" | "false" | "0" => Some(false),
            _ => None,
        }
    }
}

fn resolve_rc_path(rc_override: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = rc_override {
        if !path.exists() {
            return Err(anyhow!("rc file not found: {}", path.display()));
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(env_path) = std::env::var("OVERLIST_RC") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(home) = dirs::home_dir() {
        let path = home.join(".overlistrc");
        if path.exists() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

/// Data directory: `--data` beats `data.location`, and a leading `~` expands
/// against the home directory.
pub fn resolve_data_dir(cfg: &Config, cli_override: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = cli_override {
        return Ok(path.to_path_buf());
    }

    let location = cfg
        .get("data.location")
        .ok_or_else(|| anyhow!("data.location missing from config"))?;
    expand_tilde(&location)
}

fn expand_tilde(path: &str) -> anyhow::Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot resolve home directory"))?;
        return Ok(home.join(rest));
    }
    if path == "~" {
        return dirs::home_dir().ok_or_else(|| anyhow!("cannot resolve home directory"));
    }
    Ok(PathBuf::from(path))
}
