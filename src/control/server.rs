//! Control server setup.
//!
//! # Responsibilities
//! - Build the axum router for the control endpoints
//! - Wire up middleware (auth, tracing, request ID, timeout)
//! - Serve until the shutdown future resolves

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ControlConfig;
use crate::control::auth::api_key_middleware;
use crate::control::events::events_ws;
use crate::control::handlers::*;
use crate::supervisor::Supervisor;

/// Local HTTP + WebSocket control surface for the supervisor.
pub struct ControlServer {
    router: Router,
}

impl ControlServer {
    pub fn new(supervisor: Supervisor, config: &ControlConfig) -> Self {
        let state = ControlState {
            supervisor,
            api_key: Arc::from(config.api_key.as_str()),
        };
        let router = Self::build_router(state, Duration::from_secs(config.request_timeout_secs));
        Self { router }
    }

    /// Build the router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: ControlState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/core/start", post(start_core))
            .route("/core/stop", post(stop_core))
            .route("/core/restart", post(restart_core))
            .route("/core/status", get(get_status))
            .route("/core/auto-restart", put(set_auto_restart))
            .route("/sources", get(list_sources))
            .route("/system-proxy", get(get_system_proxy))
            .route("/events", get(events_ws))
            .layer(middleware::from_fn_with_state(state.clone(), api_key_middleware))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Control server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Control server stopped");
        Ok(())
    }
}
