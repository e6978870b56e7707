//! YAML configuration files
//!
//! The surface never refuses to start over a bad config file: a missing or
//! broken file is logged and replaced by defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a config file; `Ok(None)` when it does not exist
pub fn read_config<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Cannot read {}", path.display())),
    };
    serde_yaml::from_str(&contents)
        .map(Some)
        .with_context(|| format!("Invalid config in {}", path.display()))
}

/// Load a config, falling back to `T::default()`
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_config(path) {
        Ok(Some(config)) => {
            log::info!("Config: Loaded {}", path.display());
            config
        }
        Ok(None) => {
            log::info!("Config: {} not found, using defaults", path.display());
            T::default()
        }
        Err(e) => {
            log::warn!("Config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Write a config as YAML
///
/// Parent directories are created. The file is replaced atomically so a
/// crash mid-write leaves the previous config intact.
pub fn save_config<T: Serialize>(config: &T, path: &Path) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create config directory {}", dir.display()))?;

    let yaml = serde_yaml::to_string(config).context("Cannot serialize config")?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).with_context(|| format!("Cannot write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Cannot replace {}", path.display()))?;

    log::info!("Config: Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SurfaceConfig;

    #[test]
    fn test_load_nonexistent_returns_default() {
        let config: SurfaceConfig = load_config(Path::new("/nonexistent/path/config.yaml"));
        assert_eq!(config, SurfaceConfig::default());
    }

    #[test]
    fn test_invalid_yaml_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "playback: [this is not a map").unwrap();

        let config: SurfaceConfig = load_config(&path);
        assert_eq!(config, SurfaceConfig::default());
    }

    #[test]
    fn test_read_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "model: [1, 2").unwrap();

        let err = read_config::<SurfaceConfig>(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid config"));
        assert!(read_config::<SurfaceConfig>(&dir.path().join("absent.yaml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = SurfaceConfig::default();
        config.model = "test-model".to_string();
        config.playback.buffer_time_secs = 3.5;

        save_config(&config, &path).unwrap();
        let loaded: SurfaceConfig = load_config(&path);

        assert_eq!(loaded.model, "test-model");
        assert_eq!(loaded.playback.buffer_time_secs, 3.5);
        assert!(!path.with_extension("yaml.tmp").exists());
    }
}
