use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_api::bootstrap::{self, StartupError};
use relay_api::config::{ServerConfig, TlsConfig};
use relay_api::router::build_app_router;
use relay_api::state::AppState;
use relay_core::error::CoreError;

/// How long open connections get to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_api=debug,relay_pipeline=debug,relay_upstream=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Relay exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        use_queue = config.use_queue,
        ssl_enabled = config.ssl_enabled(),
        "Loaded server configuration",
    );

    // --- Upstream client ---
    let credentials = bootstrap::load_credentials(&config.upstream).await?;
    let client = bootstrap::build_upstream_client(&config.upstream, credentials);

    // --- App state and router ---
    let addr = config.socket_addr();
    let tls = config.tls.clone();
    let state = AppState::new(config);
    let app = build_app_router(state.clone(), &state.config);

    // --- Shutdown wiring ---
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    // --- Listener ---
    let listener = match tls {
        Some(tls) => Listener::Tls(load_tls(&tls).await?),
        None => Listener::Plain(
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|source| StartupError::Bind { addr, source })?,
        ),
    };

    // --- Background login ---
    // Health answers with `serviceInitialized: false` until this finishes.
    // A failed login stops the server.
    let init = tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move {
            let result = bootstrap::initialize(&state, client).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Failed to initialize service, shutting down");
                shutdown.cancel();
            }
            result
        }
    });

    // Fails queued jobs while connections drain.
    let runner_shutdown = bootstrap::spawn_runner_shutdown(state.clone(), shutdown.clone());

    // --- Serve ---
    let served = match listener {
        Listener::Plain(listener) => serve_plain(app, listener, shutdown.clone()).await,
        Listener::Tls(rustls_config) => {
            serve_tls(app, addr, rustls_config, shutdown.clone()).await
        }
    };

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    // A serve error ends the loop without a signal.
    shutdown.cancel();

    let init_result = if init.is_finished() {
        match init.await {
            Ok(result) => result,
            Err(e) => Err(CoreError::Internal(e.to_string())),
        }
    } else {
        init.abort();
        tracing::warn!("Shutdown requested before login completed");
        Ok(())
    };

    if let Err(e) = runner_shutdown.await {
        tracing::error!(error = %e, "Job runner shutdown task failed");
    }

    served?;
    init_result?;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Where the server accepts connections.
enum Listener {
    Plain(tokio::net::TcpListener),
    /// `axum-server` binds the address itself when serving.
    Tls(RustlsConfig),
}

async fn load_tls(tls: &TlsConfig) -> Result<RustlsConfig, StartupError> {
    // Several crates in the tree enable rustls providers; pin ring explicitly.
    let _ = rustls::crypto::ring::default_provider().install_default();

    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(StartupError::Tls)
}

async fn serve_plain(
    app: Router,
    listener: tokio::net::TcpListener,
    shutdown: CancellationToken,
) -> Result<(), StartupError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Starting server");
    }

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned())
    .into_future();

    tokio::select! {
        result = server => result.map_err(StartupError::Serve),
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(DRAIN_TIMEOUT).await;
        } => {
            tracing::warn!(
                timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "Connections still open after drain timeout, stopping anyway",
            );
            Ok(())
        }
    }
}

async fn serve_tls(
    app: Router,
    addr: SocketAddr,
    rustls_config: RustlsConfig,
    shutdown: CancellationToken,
) -> Result<(), StartupError> {
    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown.cancelled().await;
            handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
        }
    });

    tracing::info!(%addr, "Starting server with TLS");
    axum_server::bind_rustls(addr, rustls_config)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(StartupError::Serve)
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
