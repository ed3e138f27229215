//! Path management for foundry configuration files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/foundry/           # Config directory (platform config dir)
//! └── config.toml              # Client configuration
//! ```

use foundry_core::error::{FoundryError, Result};
use std::path::PathBuf;

const APP_DIR: &str = "foundry";
const CONFIG_FILE: &str = "config.toml";

pub struct FoundryPaths;

impl FoundryPaths {
    /// Returns the foundry configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/foundry/`)
    /// - `Err(FoundryError::Config)`: The platform has no config directory
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| FoundryError::config("Cannot find configuration directory"))
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_lives_in_app_dir() {
        // Not every CI sandbox has a config dir; only check shape when it does
        if let Ok(path) = FoundryPaths::config_file() {
            assert!(path.ends_with("foundry/config.toml"));
        }
    }
}
