use crate::config::Config;
use crate::job::JobOrchestrator;

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: JobOrchestrator,
}

impl AppState {
    /// Bundle the loaded configuration with the orchestrator serving it.
    #[must_use]
    pub fn new(config: Config, orchestrator: JobOrchestrator) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Orchestrator running every batch and job.
    #[must_use]
    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }
}
