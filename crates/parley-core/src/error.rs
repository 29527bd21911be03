// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared by every parley crate.

use thiserror::Error;

/// The primary error type used across repositories, services, and the gateway.
///
/// Layer boundaries wrap lower-level failures in one of the context variants
/// (`UserResolution`, `ConversationResolution`, ...) so a single log line at
/// the outermost boundary names the step that failed.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, failed validation).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database unreachable, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A webhook payload could not be serialized for the audit record.
    #[error("failed to serialize webhook payload: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A lookup by id missed.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A webhook payload is missing fields its event type requires.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// A webhook payload has the wrong overall shape.
    #[error("invalid payload format: {0}")]
    InvalidPayload(String),

    /// The webhook event-type tag is not one the pipeline handles.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// Request-level validation failure (bad slug, empty content, ...).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("failed to store webhook event: {0}")]
    WebhookPersistence(#[source] Box<ParleyError>),

    #[error("failed to find/create user: {0}")]
    UserResolution(#[source] Box<ParleyError>),

    #[error("failed to get/create conversation: {0}")]
    ConversationResolution(#[source] Box<ParleyError>),

    #[error("failed to create message: {0}")]
    MessagePersistence(#[source] Box<ParleyError>),

    /// Event sink failures (bus unreachable, publish rejected).
    #[error("event sink error: {message}")]
    EventSink {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Wrap any storage-layer error.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(source),
        }
    }

    pub fn conversation_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "conversation",
            id,
        }
    }

    pub fn message_not_found(id: i64) -> Self {
        Self::NotFound {
            entity: "message",
            id,
        }
    }

    /// True when this error, or the cause it wraps, is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::UserResolution(inner)
            | Self::ConversationResolution(inner)
            | Self::MessagePersistence(inner)
            | Self::WebhookPersistence(inner) => inner.is_not_found(),
            _ => false,
        }
    }

    /// True for errors caused by the caller's input rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingFields(_)
                | Self::InvalidPayload(_)
                | Self::UnknownEventType(_)
                | Self::Validation(_)
        )
    }
}
