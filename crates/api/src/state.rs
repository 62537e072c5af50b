use std::sync::Arc;

use jailrun_core::scripting::orchestrator::ScriptOrchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Runs submitted scripts. Stateless between calls.
    pub orchestrator: Arc<ScriptOrchestrator>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let orchestrator = Arc::new(ScriptOrchestrator::new(&config.sandbox));
        Self {
            config: Arc::new(config),
            orchestrator,
        }
    }
}
