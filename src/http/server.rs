//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, timeout, in-flight tracking)
//! - Serve until the lifecycle broadcasts shutdown, then drain

use std::time::Duration;

use axum::{
    extract::{Path, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::lifecycle::Lifecycle;
use crate::net::ListenerOrigin;
use crate::observability::metrics;

/// Upper bound for the `/slow/{ms}` handler.
const MAX_SLOW_MS: u64 = 60_000;

/// Identity of this process instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
    pub pid: u32,
    pub instance_id: Uuid,
    pub inherited_listener: bool,
}

impl InstanceInfo {
    /// Describe the current process.
    pub fn current(origin: ListenerOrigin) -> Self {
        Self {
            pid: std::process::id(),
            instance_id: Uuid::new_v4(),
            inherited_listener: matches!(origin, ListenerOrigin::Inherited(_)),
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Lifecycle,
    pub instance: InstanceInfo,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    instance: InstanceInfo,
    /// Read per request; changes when the parent exits.
    ppid: i32,
    in_flight: u64,
    shutting_down: bool,
}

/// HTTP server for the host service.
pub struct HttpServer {
    router: Router,
    lifecycle: Lifecycle,
}

impl HttpServer {
    /// Create a new HTTP server bound to a lifecycle.
    pub fn new(lifecycle: Lifecycle, instance: InstanceInfo, request_timeout: Duration) -> Self {
        let state = AppState {
            lifecycle: lifecycle.clone(),
            instance,
        };
        let router = Self::build_router(state, request_timeout);
        Self { router, lifecycle }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/", get(hello_handler))
            .route("/status", get(status_handler))
            .route("/slow/{ms}", get(slow_handler))
            .layer(middleware::from_fn_with_state(state.clone(), track_in_flight))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the lifecycle broadcasts shutdown.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        // Held until serving has fully stopped; teardown waits for it.
        let presence = self.lifecycle.subscribe();
        let mut stop = self.lifecycle.subscribe();

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Shutdown broadcast received, draining connections");
            })
            .await?;

        drop(presence);
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn track_in_flight(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let guard = state.lifecycle.work().track();
    metrics::record_in_flight(state.lifecycle.work().active_count());
    tracing::trace!(work_id = %guard.id(), uri = %request.uri(), "Request started");

    let response = next.run(request).await;

    drop(guard);
    metrics::record_in_flight(state.lifecycle.work().active_count());
    response
}

async fn hello_handler(State(state): State<AppState>) -> String {
    format!("hello from pid {}\n", state.instance.pid)
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        instance: state.instance.clone(),
        ppid: nix::unistd::getppid().as_raw(),
        in_flight: state.lifecycle.work().active_count(),
        shutting_down: state.lifecycle.is_shutting_down(),
    })
}

/// Sleep before answering; used to observe draining across a reboot.
async fn slow_handler(State(state): State<AppState>, Path(ms): Path<u64>) -> String {
    let ms = ms.min(MAX_SLOW_MS);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    format!("slept {}ms in pid {}\n", ms, state.instance.pid)
}
