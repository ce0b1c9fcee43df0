mod api;

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info, warn};

use crate::{
    directory::NetworkDirectory,
    engine::{Engine, EngineSettings, NetworkEvent},
    scenario::Scenario,
    snapshot::NetworkSnapshot,
};

pub use api::ApiError;

#[derive(Clone, Serialize)]
pub struct StateEnvelope {
    pub scenario: String,
    pub completed: bool,
    pub snapshot: NetworkSnapshot,
}

#[derive(Serialize)]
struct EventFrame<'a> {
    event: &'a NetworkEvent,
    tick: u64,
}

pub struct AppState {
    directory: Mutex<NetworkDirectory>,
    broadcaster: broadcast::Sender<String>,
    scenario_name: String,
    simulation_done: AtomicBool,
}

impl AppState {
    pub fn new(scenario_name: impl Into<String>, directory: NetworkDirectory) -> Arc<Self> {
        let (tx, _) = broadcast::channel::<String>(512);
        Arc::new(Self {
            directory: Mutex::new(directory),
            broadcaster: tx,
            scenario_name: scenario_name.into(),
            simulation_done: AtomicBool::new(false),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, NetworkDirectory>, ApiError> {
        self.directory.lock().map_err(|_| ApiError::Poisoned)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcaster.subscribe()
    }

    /// Sends an event to SSE subscribers. Having no subscribers is fine.
    pub(crate) fn publish(&self, event: &NetworkEvent, tick: u64) {
        match serde_json::to_string(&EventFrame { event, tick }) {
            Ok(payload) => {
                let _ = self.broadcaster.send(payload);
            }
            Err(err) => warn!(error = %err, "failed to encode event"),
        }
    }

    fn mark_done(&self) {
        self.simulation_done.store(true, Ordering::SeqCst);
    }
}

pub struct WebServerConfig {
    pub scenario: Scenario,
    pub host: String,
    pub port: u16,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/events", get(stream_events))
        .route("/api/zones", post(api::create_zone))
        .route("/api/zones/:zone/towers", post(api::add_tower))
        .route("/api/zones/:zone/links", post(api::add_link))
        .route("/api/users", post(api::register_user))
        .route("/api/users/:user/move", post(api::move_user))
        .route("/api/users/:user/switch", post(api::switch_zone))
        .route("/api/calls", post(api::place_call))
        .route("/api/calls/:user", delete(api::end_call))
        .with_state(state)
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        scenario,
        host,
        port,
    } = config;

    let directory = scenario.build_directory()?;
    let state = AppState::new(scenario.name.clone(), directory);

    let mut engine = Engine::new(EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
    });
    let steps = scenario.steps.clone();
    let state_for_sim = state.clone();

    let sim_handle = tokio::task::spawn_blocking(move || -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            let (events, tick) = {
                let mut directory = state_for_sim
                    .directory
                    .lock()
                    .map_err(|_| anyhow!("directory lock poisoned"))?;
                let events = engine.apply(&mut directory, index, step);
                (events, directory.tick())
            };
            for event in &events {
                state_for_sim.publish(event, tick);
            }
        }
        state_for_sim.mark_done();
        Ok(())
    });

    let scenario_label = scenario.name.clone();
    tokio::spawn(async move {
        match sim_handle.await {
            Ok(Ok(())) => info!(scenario = %scenario_label, "scenario steps completed"),
            Ok(Err(err)) => error!(error = ?err, "scenario run failed"),
            Err(err) => error!(error = ?err, "scenario task failed"),
        }
    });

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "cellnet API listening (Ctrl+C to stop)");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Result<Json<StateEnvelope>, ApiError> {
    let snapshot = state.lock()?.snapshot();
    Ok(Json(StateEnvelope {
        scenario: state.scenario_name.clone(),
        completed: state.simulation_done.load(Ordering::SeqCst),
        snapshot,
    }))
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
