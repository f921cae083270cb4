use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// External runner configuration: where the layout document lives and which
/// live-stream addresses feed it. How many endpoints there are, and how they
/// map onto power sources, is the operator's business.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default = "default_layout_path")]
    pub layout: String,
}

fn default_layout_path() -> String {
    "layout.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            layout: default_layout_path(),
        }
    }
}

impl Config {
    /// Read the config, or fall back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse config at {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("failed to write config at {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ledchain-{}-{}", std::process::id(), name))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/ledchain.json")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.layout, "layout.json");
    }

    #[test]
    fn config_round_trips_through_disk() {
        let path = scratch_path("config.json");
        let cfg = Config {
            endpoints: vec!["ws://10.0.0.5:81".into()],
            layout: "hall.json".into(),
        };
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, cfg);
        let _ = fs::remove_file(&path);
    }
}
