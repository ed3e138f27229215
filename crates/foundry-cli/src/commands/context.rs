use crate::GlobalArgs;
use anyhow::{Context, Result};
use foundry_application::{SessionController, SessionSelector};
use foundry_core::config::ClientConfig;
use foundry_infrastructure::{ConfigService, HttpBackend};
use std::sync::Arc;

/// Resolved configuration plus the backend client built from it.
pub struct AppContext {
    pub config: ClientConfig,
    pub backend: Arc<HttpBackend>,
}

impl AppContext {
    /// Loads config file and environment, then applies command-line flags.
    pub async fn load(global: &GlobalArgs) -> Result<Self> {
        let service = match &global.config {
            Some(path) => ConfigService::with_path(path),
            None => ConfigService::new(),
        };
        let mut config = service
            .get_config()
            .await
            .context("Failed to load configuration")?;
        apply_flags(&mut config, global);

        let backend = HttpBackend::new(&config).context("Invalid backend configuration")?;
        tracing::debug!("[AppContext] using backend at {}", config.base_url());
        Ok(Self {
            config,
            backend: Arc::new(backend),
        })
    }

    /// Opens a controller for `session_id`. A running batch starts being
    /// followed immediately.
    pub async fn open(&self, session_id: &str) -> Result<SessionController<HttpBackend>> {
        SessionController::open(self.backend.clone(), self.config.poll.clone(), session_id)
            .await
            .with_context(|| format!("Failed to open session '{session_id}'"))
    }

    /// Selector for following several sessions one after another.
    pub fn selector(&self) -> SessionSelector<HttpBackend> {
        SessionSelector::new(self.backend.clone(), self.config.poll.clone())
    }

    /// Opens a controller for a one-shot edit, without following the batch.
    pub async fn open_idle(&self, session_id: &str) -> Result<SessionController<HttpBackend>> {
        let controller = self.open(session_id).await?;
        controller.stop();
        Ok(controller)
    }
}

fn apply_flags(config: &mut ClientConfig, global: &GlobalArgs) {
    if let Some(url) = &global.api_url {
        config.api_url = url.clone();
    }
    if let Some(token) = &global.token {
        config.token = Some(token.clone());
    }
}
