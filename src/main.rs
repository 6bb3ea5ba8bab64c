//! Display back end entrypoint wiring the WebSocket gateway, shared state and remote database client.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nexus_display_back::{
    config::AppConfig,
    dao::{
        credential_store::{CredentialStore, FileCredentialStore},
        models::EventSelection,
        nexus::{NexusClient, NexusConfig},
        selection_store::{FileSelectionStore, SelectionStore},
    },
    routes,
    services::persistence,
    state::{AppState, SharedState, display::DisplayState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env();
    let nexus_config = NexusConfig::from_env().context("loading remote database configuration")?;

    let credentials: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(config.refresh_token_path.clone()));
    let selection_store: Arc<dyn SelectionStore> =
        Arc::new(FileSelectionStore::new(config.display_config_path.clone()));
    let client = NexusClient::new(nexus_config, credentials.clone())
        .context("building remote database client")?;

    let selection = match selection_store.load().await {
        Ok(selection) => {
            info!(region = %selection.region, event_id = %selection.event_id, "restored event selection");
            selection
        }
        Err(err) => {
            warn!(error = %err, "failed to load event selection; using defaults");
            EventSelection::default()
        }
    };

    let authenticated = match client.reload().await {
        Ok(()) => {
            info!("authenticated with saved refresh token");
            true
        }
        Err(err) => {
            warn!(error = %err, "could not reload saved credential; log in from the controller");
            false
        }
    };

    let app_state = AppState::new(
        Arc::new(client),
        credentials,
        selection_store,
        DisplayState::from_selection(selection, authenticated),
    );
    let persistence_task = persistence::spawn(app_state.clone());

    let app = build_router(app_state);

    let addr = config.bind_addr();
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    persistence_task.abort();
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
