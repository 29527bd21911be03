// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process sinks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parley_core::{EventEnvelope, EventSink, ParleyError};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

/// Drops every event. Used when the bus is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn emit_with_metadata(
        &self,
        _event_type: &str,
        _payload: Map<String, Value>,
        _metadata: BTreeMap<String, String>,
    ) -> Result<(), ParleyError> {
        Ok(())
    }
}

/// Wraps each event in an envelope and fans it out to broadcast subscribers.
///
/// Slow subscribers lag and lose the oldest envelopes; sending with no
/// subscribers is not an error.
pub struct BroadcastSink {
    source: String,
    tx: broadcast::Sender<EventEnvelope>,
}

impl BroadcastSink {
    pub fn new(source: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            source: source.into(),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventSink for BroadcastSink {
    async fn emit_with_metadata(
        &self,
        event_type: &str,
        payload: Map<String, Value>,
        metadata: BTreeMap<String, String>,
    ) -> Result<(), ParleyError> {
        let envelope = EventEnvelope::new(event_type, &self.source, payload, metadata);
        if self.tx.send(envelope).is_err() {
            tracing::trace!(event_type, "no broadcast subscribers");
        }
        Ok(())
    }
}
