// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event sink contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ParleyError;

/// Publishes named notifications to an external bus.
///
/// Services never await a sink directly. They hand events to a notifier that
/// calls the sink from a background task, so sink latency and failures stay
/// off the request path.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event_type: &str, payload: Map<String, Value>) -> Result<(), ParleyError> {
        self.emit_with_metadata(event_type, payload, BTreeMap::new())
            .await
    }

    async fn emit_with_metadata(
        &self,
        event_type: &str,
        payload: Map<String, Value>,
        metadata: BTreeMap<String, String>,
    ) -> Result<(), ParleyError>;
}
