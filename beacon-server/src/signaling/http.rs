use axum::extract::{FromRef, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::signaling::ws_handler;
use crate::{Coordinator, Heartbeat, RelayConfig};

/// State shared by every route.
#[derive(Clone)]
pub struct RelayState {
    pub coordinator: Coordinator,
    pub heartbeat: Heartbeat,
}

impl FromRef<RelayState> for Coordinator {
    fn from_ref(state: &RelayState) -> Self {
        state.coordinator.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub connections: usize,
    pub rooms: usize,
}

pub async fn health(State(coordinator): State<Coordinator>) -> Json<HealthReport> {
    let stats = coordinator.stats();
    Json(HealthReport {
        status: "healthy",
        connections: stats.connections,
        rooms: stats.rooms,
    })
}

/// `/ws` for signaling sockets, `/health` for probes. Any origin is allowed.
pub fn router(coordinator: Coordinator, heartbeat: Heartbeat) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(RelayState {
            coordinator,
            heartbeat,
        })
}

/// Serves the relay on `listener` until `shutdown` resolves.
/// The sweep runs for as long as the server does.
pub async fn serve<F>(listener: TcpListener, config: &RelayConfig, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let coordinator = Coordinator::new();
    let sweeper = coordinator.spawn_sweeper(config.sweep_interval, config.room_max_age);

    info!("Signaling server listening on http://{}", listener.local_addr()?);

    let result = axum::serve(listener, router(coordinator, config.heartbeat()))
        .with_graceful_shutdown(shutdown)
        .await;

    sweeper.abort();
    info!("Server closed");
    result
}
