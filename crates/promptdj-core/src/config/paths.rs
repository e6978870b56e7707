//! Standard locations for PromptDJ files

use std::path::PathBuf;

/// Base directory for PromptDJ configuration and state
///
/// Returns: `<platform config dir>/promptdj` (e.g. `~/.config/promptdj`)
pub fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promptdj")
}

/// Default config file path
///
/// Returns: `<data dir>/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_ends_with_promptdj() {
        assert!(default_data_dir().ends_with("promptdj"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        assert!(default_config_path().ends_with("config.yaml"));
    }
}
