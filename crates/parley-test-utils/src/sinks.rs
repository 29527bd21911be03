// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event sinks for assertions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parley_core::{EventEnvelope, EventSink, ParleyError};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// Keeps every emitted envelope.
///
/// Events reach a sink through the notifier's worker task, so tests should
/// use [`wait_for_events`](Self::wait_for_events) rather than reading
/// [`events`](Self::events) straight after the call under test.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().await.clone()
    }

    pub async fn events_of(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Poll until at least `count` events arrived or `timeout` passes, then
    /// return what was recorded.
    pub async fn wait_for_events(&self, count: usize, timeout: Duration) -> Vec<EventEnvelope> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let events = self.events().await;
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit_with_metadata(
        &self,
        event_type: &str,
        payload: Map<String, Value>,
        metadata: BTreeMap<String, String>,
    ) -> Result<(), ParleyError> {
        let envelope = EventEnvelope::new(event_type, "parley-test", payload, metadata);
        self.events.lock().await.push(envelope);
        Ok(())
    }
}

/// Rejects every event and counts the attempts.
#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for FailingSink {
    async fn emit_with_metadata(
        &self,
        _event_type: &str,
        _payload: Map<String, Value>,
        _metadata: BTreeMap<String, String>,
    ) -> Result<(), ParleyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ParleyError::EventSink {
            message: "event bus unavailable".into(),
            source: None,
        })
    }
}
