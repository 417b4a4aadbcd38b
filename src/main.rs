//! Slot race backend entrypoint wiring REST, SSE, storage and the reconciler.

use std::{env, fs, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slot_race_back::{
    config::AppConfig,
    dao::{
        booking_store::{BookingStore, memory::MemoryBookingStore},
        tables::Tables,
    },
    routes,
    services::{reconciler, storage_supervisor},
    state::{AppState, SharedState},
};

/// Environment variable pointing at a JSON snapshot used to seed the in-memory store.
const SEED_PATH_ENV: &str = "SLOT_RACE_SEED_PATH";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let reconcile_interval = config.reconcile_interval();
    let app_state = AppState::new(config);

    spawn_storage(app_state.clone())?;
    tokio::spawn(reconciler::run(app_state.clone(), reconcile_interval));
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

/// Start the storage supervisor on CouchDB when configured, in memory otherwise.
fn spawn_storage(state: SharedState) -> anyhow::Result<()> {
    #[cfg(feature = "couch-store")]
    {
        use slot_race_back::dao::{
            booking_store::couchdb::{CouchBookingStore, CouchConfig},
            storage::StorageError,
        };

        if let Some(couch) = CouchConfig::from_env() {
            info!(base_url = %couch.base_url, database = %couch.database, "using CouchDB booking store");
            tokio::spawn(storage_supervisor::run(state, move || {
                let couch = couch.clone();
                async move {
                    CouchBookingStore::connect(couch)
                        .await
                        .map(|store| Arc::new(store) as Arc<dyn BookingStore>)
                        .map_err(StorageError::from)
                }
            }));
            return Ok(());
        }
    }

    let tables = load_seed()?;
    info!(
        clubs = tables.clubs.len(),
        users = tables.users.len(),
        slots = tables.slots.len(),
        "using in-memory booking store"
    );
    let store: Arc<dyn BookingStore> = Arc::new(MemoryBookingStore::seeded(tables));
    tokio::spawn(storage_supervisor::run(state, move || {
        let store = store.clone();
        async move { Ok(store) }
    }));
    Ok(())
}

fn load_seed() -> anyhow::Result<Tables> {
    let Ok(path) = env::var(SEED_PATH_ENV) else {
        return Ok(Tables::default());
    };
    let contents = fs::read_to_string(&path).with_context(|| format!("reading seed {path}"))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing seed {path}"))
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
