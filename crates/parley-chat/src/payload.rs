// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field extraction from weakly-typed webhook payloads.
//!
//! Platforms send arbitrary JSON objects. Extraction is permissive: a field
//! with the wrong JSON type counts as absent rather than as a parse error.
//! Only the fields an event cannot be processed without are reported.

use std::str::FromStr;

use parley_core::ParleyError;
use parley_core::types::MessageType;
use serde_json::{Map, Value};

/// Fields of a `"message"` event.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub platform_message_id: Option<String>,
    pub platform_user_id: String,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
    pub user_email: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
}

impl InboundMessage {
    /// Requires non-empty `user_id` and `content` strings. An absent or
    /// unrecognized `message_type` becomes `text`.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, ParleyError> {
        let platform_user_id = string_field(payload, "user_id");
        let content = string_field(payload, "content");

        let (platform_user_id, content) = match (platform_user_id, content) {
            (Some(user), Some(content)) => (user, content),
            (user, content) => {
                let mut missing = Vec::new();
                if user.is_none() {
                    missing.push("user_id");
                }
                if content.is_none() {
                    missing.push("content");
                }
                return Err(ParleyError::MissingFields(missing));
            }
        };

        let message_type = string_field(payload, "message_type")
            .and_then(|t| MessageType::from_str(&t).ok())
            .unwrap_or_default();

        Ok(Self {
            platform_message_id: string_field(payload, "message_id"),
            platform_user_id,
            user_name: string_field(payload, "user_name"),
            user_phone: string_field(payload, "user_phone"),
            user_email: string_field(payload, "user_email"),
            content,
            message_type,
            media_url: string_field(payload, "media_url"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    Delivered,
    Read,
}

/// Fields of a `"status_update"` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReceipt {
    pub message_id: i64,
    /// `None` for any status other than `delivered` or `read`; such
    /// receipts are acknowledged and ignored.
    pub receipt: Option<Receipt>,
}

impl StatusReceipt {
    /// Requires a numeric `message_id`. Whole floats are accepted because
    /// some platforms encode every number as a double.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, ParleyError> {
        let message_id = payload
            .get("message_id")
            .and_then(integer)
            .ok_or_else(|| ParleyError::MissingFields(vec!["message_id"]))?;

        let receipt = match payload.get("status").and_then(Value::as_str) {
            Some("delivered") => Some(Receipt::Delivered),
            Some("read") => Some(Receipt::Read),
            _ => None,
        };

        Ok(Self {
            message_id,
            receipt,
        })
    }
}

/// A non-empty string value, or `None`.
fn string_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}
