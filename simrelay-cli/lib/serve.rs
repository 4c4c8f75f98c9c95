use std::{net::IpAddr, path::PathBuf, sync::Arc};

use axum::http::{header::CONTENT_TYPE, Method};
use simrelay_core::config::RelayConfig;
use simrelay_server::{route, state::AppState, Config};
use simrelay_utils::CHECKMARK;
use tower_http::cors::{Any, CorsLayer};

use crate::{SimrelayCliError, SimrelayCliResult};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Loads the relay configuration from the environment and applies command-line overrides.
pub fn relay_config(
    python: Option<PathBuf>,
    max_sessions: Option<usize>,
    max_frames: Option<u64>,
) -> SimrelayCliResult<RelayConfig> {
    let mut config = RelayConfig::from_env()?;

    if let Some(python) = python {
        config.set_python_exe(python);
    }

    if let Some(max_sessions) = max_sessions {
        config.set_max_sessions(max_sessions);
    }

    if max_frames.is_some() {
        config.set_max_frames(max_frames);
    }

    config.validate()?;
    Ok(config)
}

/// Checks that the configured interpreter can be found.
pub fn check_interpreter(config: &RelayConfig) -> SimrelayCliResult<PathBuf> {
    which::which(config.get_python_exe()).map_err(|e| {
        SimrelayCliError::InterpreterNotFound(format!(
            "{}: {e}",
            config.get_python_exe().display()
        ))
    })
}

/// Serves viewers until Ctrl-C, then tears down every session.
pub async fn serve(
    host: Option<IpAddr>,
    port: Option<u16>,
    relay: RelayConfig,
) -> SimrelayCliResult<()> {
    let python = check_interpreter(&relay)?;
    tracing::info!("running programs with {}", python.display());

    let config = Arc::new(Config::new(host, port, relay)?);
    let state = AppState::new(config.clone());
    let registry = state.get_registry().clone();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_headers([CONTENT_TYPE])
        .allow_origin(Any);

    let app = route::create_router(state).layer(cors);

    tracing::info!("starting server on {}", config.get_addr());
    println!(
        "{} Server listening on {}",
        &*CHECKMARK,
        console::style(config.get_addr()).yellow()
    );

    let listener = tokio::net::TcpListener::bind(config.get_addr()).await?;

    let sessions = registry.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {e}");
                return;
            }
            tracing::info!("shutdown requested");
            sessions.shutdown().await;
        })
        .await?;

    registry.shutdown().await;
    println!("{} Server stopped", &*CHECKMARK);

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
