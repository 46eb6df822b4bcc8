use std::sync::{Arc, OnceLock};

use relay_core::error::CoreError;
use relay_core::session::Session;
use relay_pipeline::runner::JobRunner;

use crate::config::ServerConfig;
use crate::middleware::rate_limit::ClientRateLimiter;

/// Everything that only exists after a successful login.
pub struct Service {
    pub session: Arc<Session>,
    pub runner: Arc<dyn JobRunner>,
}

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Installed exactly once by the startup task; read lock-free afterwards.
    pub service: Arc<OnceLock<Service>>,
    /// Per-client request budget.
    pub limiter: Arc<ClientRateLimiter>,
}

impl AppState {
    /// State for a server that has not logged in yet.
    pub fn new(config: ServerConfig) -> Self {
        let limiter = ClientRateLimiter::new(config.client_rate_limit);
        Self {
            config: Arc::new(config),
            service: Arc::new(OnceLock::new()),
            limiter: Arc::new(limiter),
        }
    }

    /// The logged-in service, or [`CoreError::ServiceNotInitialized`].
    pub fn service(&self) -> Result<&Service, CoreError> {
        self.service.get().ok_or(CoreError::ServiceNotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.service.get().is_some()
    }

    /// Publish the service to request handlers. Only the first call wins.
    pub fn install(&self, service: Service) -> Result<(), CoreError> {
        self.service
            .set(service)
            .map_err(|_| CoreError::Internal("service is already initialized".to_string()))
    }
}
