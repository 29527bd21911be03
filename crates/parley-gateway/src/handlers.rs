// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request handlers.
//!
//! Path ids and query parameters are parsed here rather than by axum
//! extractors so malformed input gets the same `{"error": ...}` body as
//! every other failure. Query numbers are lenient: anything unparsable
//! counts as absent and falls back to the default.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use parley_chat::OutgoingMessage;
use parley_core::{HealthStatus, PluginAdapter};
use parley_core::pagination::{
    DEFAULT_LIMIT, MESSAGE_DEFAULT_LIMIT, normalize_limit, normalize_offset,
};
use parley_core::types::{
    ConversationPriority, ConversationQuery, ConversationStatus, MessageQuery,
};

use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub storage: String,
    pub event_bus: String,
}

/// Collapse an adapter health check into `(healthy, serving, detail)`.
async fn probe(adapter: &dyn PluginAdapter) -> (bool, bool, String) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => (true, true, "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => (false, true, reason),
        Ok(HealthStatus::Unhealthy(reason)) => (false, false, reason),
        Err(e) => (false, false, e.to_string()),
    }
}

/// `GET /health`. 503 when storage is unhealthy. An unreachable event bus
/// only degrades the status, since notifications are best-effort.
pub async fn health(State(state): State<GatewayState>) -> Response {
    let (storage_ok, storage_serving, storage) = probe(state.storage.as_ref()).await;
    let (bus_ok, event_bus) = match &state.event_bus {
        Some(bus) => {
            let (ok, _, detail) = probe(bus.as_ref()).await;
            (ok, detail)
        }
        None => (true, "disabled".to_string()),
    };

    let (status, code) = if !storage_serving {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    } else if storage_ok && bus_ok {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::OK)
    };
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
        storage,
        event_bus,
    };
    (code, Json(body)).into_response()
}

/// `POST /api/v1/webhooks/{channel_id}/{platform}`
///
/// The body must be a JSON object. Its `event_type` string selects the
/// handler and defaults to `"message"`. Any pipeline failure is a 500 so
/// the platform redelivers.
pub async fn receive_webhook(
    State(state): State<GatewayState>,
    Path((channel_id, platform)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let channel_id: i64 = channel_id
        .parse()
        .map_err(|_| ApiError::bad_request("invalid channel ID"))?;
    if platform.trim().is_empty() {
        return Err(ApiError::bad_request("platform is required"));
    }

    let payload: serde_json::Map<String, Value> =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("invalid payload"))?;
    let event_type = payload
        .get("event_type")
        .and_then(Value::as_str)
        .unwrap_or("message")
        .to_string();

    tracing::debug!(channel_id, %platform, %event_type, "webhook received");
    state
        .services
        .webhooks
        .process_webhook(channel_id, &event_type, &payload)
        .await
        .map_err(|e| ApiError::internal(&e))?;

    Ok(Json(json!({ "status": "processed" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub before: Option<String>,
}

impl ListParams {
    fn number(raw: Option<&str>) -> Option<i64> {
        raw.and_then(|s| s.trim().parse().ok())
    }

    fn limit(&self, default: i64) -> i64 {
        normalize_limit(Self::number(self.limit.as_deref()).unwrap_or(0), default)
    }

    fn offset(&self) -> i64 {
        normalize_offset(Self::number(self.offset.as_deref()).unwrap_or(0))
    }
}

/// `GET /api/v1/channels/{channel_id}/conversations?status&limit&offset`
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Path(channel_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let channel_id = parse_id(&channel_id, "channel")?;
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse::<ConversationStatus>()
                .map_err(|_| ApiError::bad_request(format!("invalid status: {raw}")))?,
        ),
        None => None,
    };
    let query = ConversationQuery {
        status,
        limit: params.limit(DEFAULT_LIMIT),
        offset: params.offset(),
    };

    let conversations = state
        .services
        .conversations
        .list_by_channel(channel_id, query)
        .await?;
    Ok(Json(json!({
        "data": conversations,
        "limit": query.limit,
        "offset": query.offset,
    })))
}

/// `GET /api/v1/conversations/{id}`
pub async fn get_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, "conversation")?;
    let conversation = state.services.conversations.get(id).await?;
    Ok(Json(conversation).into_response())
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assignee_id: String,
}

/// `POST /api/v1/conversations/{id}/assign`
pub async fn assign_conversation(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, "conversation")?;
    let req: AssignRequest = parse_body(&body)?;
    let conversation = state
        .services
        .conversations
        .assign(id, &req.assignee_id)
        .await?;
    Ok(Json(conversation).into_response())
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ConversationStatus,
}

/// `PATCH /api/v1/conversations/{id}/status`
pub async fn update_status(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, "conversation")?;
    let req: StatusRequest = parse_body(&body)?;
    let conversation = state
        .services
        .conversations
        .update_status(id, req.status)
        .await?;
    Ok(Json(conversation).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PriorityRequest {
    pub priority: ConversationPriority,
}

/// `PATCH /api/v1/conversations/{id}/priority`
pub async fn update_priority(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, "conversation")?;
    let req: PriorityRequest = parse_body(&body)?;
    let conversation = state
        .services
        .conversations
        .update_priority(id, req.priority)
        .await?;
    Ok(Json(conversation).into_response())
}

/// `GET /api/v1/conversations/{id}/messages?limit&offset&before`
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "conversation")?;
    let query = MessageQuery {
        limit: params.limit(MESSAGE_DEFAULT_LIMIT),
        offset: params.offset(),
        before_id: ListParams::number(params.before.as_deref()),
    };

    let messages = state.services.outbound.history(id, query).await?;
    Ok(Json(json!({
        "data": messages,
        "limit": query.limit,
        "offset": query.offset,
    })))
}

/// `POST /api/v1/conversations/{id}/messages`
pub async fn send_message(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let id = parse_id(&id, "conversation")?;
    let outgoing: OutgoingMessage = parse_body(&body)?;
    let message = state.services.outbound.send_outgoing(id, outgoing).await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}

/// `POST /api/v1/messages/{id}/delivered`
pub async fn mark_delivered(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "message")?;
    state.services.outbound.mark_delivered(id).await?;
    Ok(Json(json!({ "message": "marked as delivered" })))
}

/// `POST /api/v1/messages/{id}/read`
pub async fn mark_read(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id, "message")?;
    state.services.outbound.mark_read(id).await?;
    Ok(Json(json!({ "message": "marked as read" })))
}

fn parse_id(raw: &str, entity: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("invalid {entity} ID")))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))
}
