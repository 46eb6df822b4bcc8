//! Startup wiring: credentials, login, and job runner selection.
//!
//! The binary serves HTTP before the upstream login finishes; [`initialize`]
//! runs on a background task and installs the [`Service`] once the session
//! exists.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::HeaderValue;
use relay_core::error::CoreError;
use relay_pipeline::generation::GenerationPipeline;
use relay_pipeline::runner::{InlineRunner, JobRunner};
use relay_pipeline::serialized::SerializedRunner;
use relay_upstream::api::{IdeogramApi, UpstreamCredentials};
use relay_upstream::client::{ClientSettings, IdeogramClient, UpstreamClient};
use relay_upstream::poller::Poller;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, ServerConfig, UpstreamConfig};
use crate::state::{AppState, Service};

/// Fatal startup failures. Any of these ends the process with status 1.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read {}: {source}", path.display())]
    Credentials {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} does not hold a valid HTTP header value", path.display())]
    InvalidCredential { path: PathBuf },

    #[error("Failed to load TLS certificate or key: {0}")]
    Tls(#[source] io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] io::Error),

    #[error("Service initialization failed: {0}")]
    Init(#[from] CoreError),
}

/// Read the bearer credential and cookie files. Surrounding whitespace is
/// stripped; anything else that cannot travel in a header is rejected.
pub async fn load_credentials(
    config: &UpstreamConfig,
) -> Result<UpstreamCredentials, StartupError> {
    Ok(UpstreamCredentials {
        authorization: read_trimmed(&config.authorization_file).await?,
        cookie: read_trimmed(&config.cookie_file).await?,
    })
}

async fn read_trimmed(path: &Path) -> Result<String, StartupError> {
    let value = tokio::fs::read_to_string(path)
        .await
        .map(|s| s.trim().to_string())
        .map_err(|source| StartupError::Credentials {
            path: path.to_path_buf(),
            source,
        })?;

    if HeaderValue::from_str(&value).is_err() {
        return Err(StartupError::InvalidCredential {
            path: path.to_path_buf(),
        });
    }
    Ok(value)
}

/// Build the HTTP-backed upstream client from configuration.
pub fn build_upstream_client(
    config: &UpstreamConfig,
    credentials: UpstreamCredentials,
) -> Arc<dyn UpstreamClient> {
    let api = IdeogramApi::new(config.base_url.clone(), credentials);
    let settings = ClientSettings {
        location: config.location.clone(),
        external_photo_url: config.external_photo_url.clone(),
    };
    Arc::new(IdeogramClient::new(api, settings))
}

/// Pick the job runner for this deployment.
pub fn build_runner(
    config: &ServerConfig,
    pipeline: Arc<GenerationPipeline>,
) -> Arc<dyn JobRunner> {
    if !config.use_queue {
        tracing::info!("Job queue disabled, running generations inline");
        return Arc::new(InlineRunner::new(pipeline));
    }

    if let Some(url) = &config.queue_broker_url {
        tracing::warn!(
            broker = %url,
            "External queue broker is not supported, using the in-process queue",
        );
    }
    Arc::new(SerializedRunner::start(pipeline, config.rate_window()))
}

/// Log in, build the pipeline and runner, and publish them to handlers.
pub async fn initialize(
    state: &AppState,
    client: Arc<dyn UpstreamClient>,
) -> Result<(), CoreError> {
    tracing::info!("Logging in to upstream");
    let session = Arc::new(client.login().await?);

    let poller = Poller::new(state.config.poll, state.config.upstream.asset_base_url.clone());
    let pipeline = Arc::new(GenerationPipeline::new(client, Arc::clone(&session), poller));
    let runner = build_runner(&state.config, pipeline);

    state.install(Service {
        session: Arc::clone(&session),
        runner,
    })?;

    tracing::info!(
        user_handle = %session.user_handle,
        org_id = %session.org_id,
        queue_enabled = state.config.use_queue,
        "Service initialized",
    );
    Ok(())
}

/// Stop the job runner as soon as `shutdown` fires.
///
/// Runs alongside the server drain: callers still waiting in the queue get
/// their `TRANSPORT_ERROR` response instead of holding the drain open.
pub fn spawn_runner_shutdown(state: AppState, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown.cancelled().await;
        match state.service.get() {
            Some(service) => service.runner.shutdown().await,
            None => tracing::debug!("Shutdown before login, no job runner to stop"),
        }
    })
}
