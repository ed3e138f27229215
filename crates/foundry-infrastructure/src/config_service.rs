//! Configuration service implementation.
//!
//! Loads the client configuration from `~/.config/foundry/config.toml` (or an
//! explicit path), then applies environment overrides. Command-line flags are
//! applied on top by the caller.

use crate::paths::FoundryPaths;
use foundry_core::config::ClientConfig;
use foundry_core::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const ENV_API_URL: &str = "FOUNDRY_API_URL";
pub const ENV_TOKEN: &str = "FOUNDRY_TOKEN";

/// Configuration service that loads and caches the client configuration.
#[derive(Debug, Clone)]
pub struct ConfigService {
    /// Explicit config file; `None` means the default location.
    path: Option<PathBuf>,
    /// Cached configuration loaded from file.
    config: Arc<RwLock<Option<ClientConfig>>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Uses `path` instead of the default config file location.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    pub async fn get_config(&self) -> Result<ClientConfig> {
        {
            let read_lock = self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(ref cached) = *read_lock {
                return Ok(cached.clone());
            }
        }

        let path = match &self.path {
            Some(path) => path.clone(),
            None => FoundryPaths::config_file()?,
        };
        let mut loaded = load_file(&path).await?;
        apply_env_overrides(&mut loaded, |key| std::env::var(key).ok());

        {
            let mut write_lock = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *write_lock = Some(loaded.clone());
        }

        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *write_lock = None;
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a TOML config file. A missing file yields the defaults.
pub async fn load_file(path: &Path) -> Result<ClientConfig> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            tracing::debug!("[ConfigService] loaded {}", path.display());
            Ok(toml::from_str(&text)?)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("[ConfigService] {} not found, using defaults", path.display());
            Ok(ClientConfig::default())
        }
        Err(err) => Err(err.into()),
    }
}

/// Applies `FOUNDRY_API_URL` / `FOUNDRY_TOKEN`. Empty values are ignored.
pub fn apply_env_overrides(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_API_URL).filter(|value| !value.trim().is_empty()) {
        config.api_url = url;
    }
    if let Some(token) = lookup(ENV_TOKEN).filter(|value| !value.trim().is_empty()) {
        config.token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::config::DEFAULT_API_URL;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_file(&dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[tokio::test]
    async fn test_load_file_and_cache() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "api_url = \"https://factory.example/api\"\ntoken = \"t-1\"\n\n[poll]\nmax_attempts = 10\n",
        )
        .unwrap();

        let service = ConfigService::with_path(&path);
        let config = service.get_config().await.unwrap();
        assert_eq!(config.poll.max_attempts, 10);
        assert_eq!(config.poll.interval_ms, 2_000);

        // Cached until invalidated
        std::fs::write(&path, "api_url = \"https://other.example/api\"\n").unwrap();
        assert_eq!(service.get_config().await.unwrap().poll.max_attempts, 10);
        service.invalidate_cache();
        assert_eq!(service.get_config().await.unwrap().poll.max_attempts, 900);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = [").unwrap();
        let err = load_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_API_URL, "https://env.example/api"), (ENV_TOKEN, "")]);
        let mut config = ClientConfig::default().with_token("from-file");
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, "https://env.example/api");
        assert_eq!(config.token.as_deref(), Some("from-file"));
        assert_ne!(config.api_url, DEFAULT_API_URL);
    }
}
