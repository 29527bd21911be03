// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router assembly and the listener loop.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use parley_chat::ChatServices;
use parley_config::model::CorsConfig;
use parley_core::{ParleyError, PluginAdapter};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, require_bearer};
use crate::handlers;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub services: ChatServices,
    /// Reported by `/health`.
    pub storage: Arc<dyn PluginAdapter>,
    /// Reported by `/health` when the event bus is enabled.
    pub event_bus: Option<Arc<dyn PluginAdapter>>,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(services: ChatServices, storage: Arc<dyn PluginAdapter>) -> Self {
        Self {
            services,
            storage,
            event_bus: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<dyn PluginAdapter>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

/// Build the full application router.
///
/// Public: `/health` and the webhook ingress. Everything else under
/// `/api/v1` goes through [`require_bearer`].
pub fn router(state: GatewayState, auth: AuthConfig, cors: &CorsConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/v1/webhooks/{channel_id}/{platform}",
            post(handlers::receive_webhook),
        );

    let api_routes = Router::new()
        .route(
            "/api/v1/channels/{channel_id}/conversations",
            get(handlers::list_conversations),
        )
        .route("/api/v1/conversations/{id}", get(handlers::get_conversation))
        .route(
            "/api/v1/conversations/{id}/assign",
            post(handlers::assign_conversation),
        )
        .route(
            "/api/v1/conversations/{id}/status",
            patch(handlers::update_status),
        )
        .route(
            "/api/v1/conversations/{id}/priority",
            patch(handlers::update_priority),
        )
        .route(
            "/api/v1/conversations/{id}/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route(
            "/api/v1/messages/{id}/delivered",
            post(handlers::mark_delivered),
        )
        .route("/api/v1/messages/{id}/read", post(handlers::mark_read))
        .route_layer(axum_middleware::from_fn_with_state(auth, require_bearer));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&cors.allowed_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Bind and serve until `shutdown` is cancelled, then finish in-flight
/// requests.
pub async fn serve(
    config: &ListenConfig,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), ParleyError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Internal(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ParleyError::Internal(format!("server error: {e}")))?;

    tracing::info!("server stopped");
    Ok(())
}
