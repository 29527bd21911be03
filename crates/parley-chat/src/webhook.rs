// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook ingestion pipeline.
//!
//! Every call that gets past serialization leaves exactly one audit row,
//! finalized as processed whether or not dispatch succeeded:
//!
//! ```text
//! serialize -> insert row (processed = false) -> dispatch -> mark processed
//!                                                         \-> mark failed(error)
//! ```
//!
//! "Processed" means the outcome is recorded, not that it succeeded. Failed
//! events are never retried here; the platform redelivers, or an operator
//! replays the row.

use std::sync::Arc;

use parley_core::types::{NewWebhookEvent, WebhookEvent};
use parley_core::{ParleyError, WebhookEventRepository};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::outbound::OutboundService;
use crate::payload::{InboundMessage, Receipt, StatusReceipt};
use crate::threading::ThreadingService;

/// Event-type tag for inbound chat messages.
pub const MESSAGE_EVENT: &str = "message";
/// Event-type tag for delivery and read receipts.
pub const STATUS_UPDATE_EVENT: &str = "status_update";

#[derive(Clone)]
pub struct WebhookPipeline {
    events: Arc<dyn WebhookEventRepository>,
    threading: ThreadingService,
    outbound: OutboundService,
}

impl WebhookPipeline {
    pub fn new(
        events: Arc<dyn WebhookEventRepository>,
        threading: ThreadingService,
        outbound: OutboundService,
    ) -> Self {
        Self {
            events,
            threading,
            outbound,
        }
    }

    /// Record, dispatch, and finalize one webhook call.
    ///
    /// Serialization and the initial insert fail fast with nothing recorded.
    /// After that, a dispatch error is written to the row and also returned.
    pub async fn process_webhook<P>(
        &self,
        channel_id: i64,
        event_type: &str,
        payload: &P,
    ) -> Result<(), ParleyError>
    where
        P: Serialize + ?Sized,
    {
        let value = serde_json::to_value(payload).map_err(ParleyError::Serialization)?;
        let raw = serde_json::to_string(&value).map_err(ParleyError::Serialization)?;

        let event = self
            .events
            .create(&NewWebhookEvent {
                channel_id,
                event_type: event_type.to_string(),
                payload: raw,
            })
            .await
            .map_err(|e| ParleyError::WebhookPersistence(Box::new(e)))?;

        let outcome = self.dispatch(channel_id, event_type, &value).await;
        self.finalize(&event, &outcome).await;
        outcome
    }

    async fn dispatch(
        &self,
        channel_id: i64,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), ParleyError> {
        match event_type {
            MESSAGE_EVENT => {
                let inbound = InboundMessage::from_payload(as_object(payload)?)?;
                self.threading
                    .process_incoming(channel_id, inbound)
                    .await
                    .map(drop)
            }
            STATUS_UPDATE_EVENT => {
                let receipt = StatusReceipt::from_payload(as_object(payload)?)?;
                match receipt.receipt {
                    Some(Receipt::Delivered) => self.outbound.mark_delivered(receipt.message_id).await,
                    Some(Receipt::Read) => self.outbound.mark_read(receipt.message_id).await,
                    None => {
                        tracing::debug!(
                            message_id = receipt.message_id,
                            "ignoring receipt with unhandled status"
                        );
                        Ok(())
                    }
                }
            }
            other => Err(ParleyError::UnknownEventType(other.to_string())),
        }
    }

    async fn finalize(&self, event: &WebhookEvent, outcome: &Result<(), ParleyError>) {
        let marked = match outcome {
            Ok(()) => self.events.mark_processed(event.id).await,
            Err(err) => {
                tracing::warn!(
                    webhook_event_id = event.id,
                    channel_id = event.channel_id,
                    event_type = %event.event_type,
                    error = %err,
                    "webhook processing failed"
                );
                self.events.mark_failed(event.id, &err.to_string()).await
            }
        };
        if let Err(e) = marked {
            tracing::warn!(webhook_event_id = event.id, error = %e, "failed to finalize webhook event");
        }
    }

    /// Rows never finalized, oldest first. Normally empty; anything here was
    /// interrupted between insert and finalize.
    pub async fn list_unprocessed(
        &self,
        channel_id: i64,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, ParleyError> {
        self.events.list_unprocessed(channel_id, limit).await
    }

    /// Rows finalized with an error, newest first.
    pub async fn list_failed(
        &self,
        channel_id: i64,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, ParleyError> {
        self.events.list_failed(channel_id, limit).await
    }

    /// Run a recorded payload through the pipeline again.
    ///
    /// The replay gets its own audit row; the source row is left as it was.
    pub async fn replay(&self, webhook_event_id: i64) -> Result<(), ParleyError> {
        let event = self
            .events
            .get_by_id(webhook_event_id)
            .await?
            .ok_or(ParleyError::NotFound {
                entity: "webhook event",
                id: webhook_event_id,
            })?;
        let payload: Value =
            serde_json::from_str(&event.payload).map_err(ParleyError::Serialization)?;

        tracing::info!(
            webhook_event_id,
            channel_id = event.channel_id,
            event_type = %event.event_type,
            "replaying webhook event"
        );
        self.process_webhook(event.channel_id, &event.event_type, &payload)
            .await
    }
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>, ParleyError> {
    payload
        .as_object()
        .ok_or_else(|| ParleyError::InvalidPayload("expected a JSON object".into()))
}
