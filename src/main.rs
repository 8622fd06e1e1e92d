//! Orienteer Back binary entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use dao::race_store::memory::MemoryRaceStore;
#[cfg(feature = "mongo-store")]
use dao::race_store::{
    RaceStore,
    mongodb::{MongoConfig, MongoRaceStore},
};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());

    bootstrap_store(&app_state).await;
    tokio::spawn(relay_degraded_status(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Choose and launch the persistence backend. MongoDB runs under the
/// reconnecting supervisor; the in-memory store is installed directly and the
/// server starts serving from it immediately.
async fn bootstrap_store(state: &SharedState) {
    if memory_store_requested() {
        info!("installing the in-memory race store (ORIENTEER_STORE=memory)");
        state
            .install_race_store(Arc::new(MemoryRaceStore::new()))
            .await;
        return;
    }

    #[cfg(feature = "mongo-store")]
    {
        let uri = env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
        let db_name = env::var("MONGO_DB").ok();

        tokio::spawn(services::storage_supervisor::run(
            state.clone(),
            move || {
                let uri = uri.clone();
                let db_name = db_name.clone();
                async move {
                    let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                    let store = MongoRaceStore::connect(config).await?;
                    Ok(Arc::new(store) as Arc<dyn RaceStore>)
                }
            },
        ));
    }

    #[cfg(not(feature = "mongo-store"))]
    {
        info!("built without the mongo-store feature; using the in-memory race store");
        state
            .install_race_store(Arc::new(MemoryRaceStore::new()))
            .await;
    }
}

/// True when the deployment explicitly asked for the volatile backend.
fn memory_store_requested() -> bool {
    env::var("ORIENTEER_STORE")
        .map(|value| value.eq_ignore_ascii_case("memory"))
        .unwrap_or(false)
}

/// Forward degraded-flag changes to the public SSE stream. New subscribers
/// learn the current value from their handshake instead.
async fn relay_degraded_status(state: SharedState) {
    let mut watcher = state.degraded_watcher();
    while watcher.changed().await.is_ok() {
        let degraded = *watcher.borrow_and_update();
        services::race_events::broadcast_system_status(&state, degraded);
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
