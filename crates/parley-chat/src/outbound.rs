// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent replies, delivery receipts, and history reads.

use std::sync::Arc;

use parley_bus::{Notifier, catalog};
use parley_core::types::{
    Message, MessageDirection, MessageQuery, MessageStatus, MessageType, NewMessage, SenderType,
};
use parley_core::{ConversationRepository, MessageRepository, ParleyError};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::repositories::Repositories;
use crate::threading::message_payload;

/// An agent-authored message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutgoingMessage {
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub media_url: Option<String>,
    /// Identifier of the agent sending the reply, when known.
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Clone)]
pub struct OutboundService {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifier: Notifier,
}

impl OutboundService {
    pub fn new(repos: &Repositories, notifier: Notifier) -> Self {
        Self {
            conversations: repos.conversations.clone(),
            messages: repos.messages.clone(),
            notifier,
        }
    }

    pub async fn send_outgoing(
        &self,
        conversation_id: i64,
        outgoing: OutgoingMessage,
    ) -> Result<Message, ParleyError> {
        if outgoing.content.trim().is_empty() {
            return Err(ParleyError::Validation("content is required".into()));
        }

        let conversation = self
            .conversations
            .get_by_id(conversation_id)
            .await?
            .ok_or_else(|| ParleyError::conversation_not_found(conversation_id))?;

        let message = self
            .messages
            .create(&NewMessage {
                conversation_id,
                platform_message_id: None,
                sender_type: SenderType::Internal,
                sender_id: outgoing.sender_id,
                content: outgoing.content,
                message_type: outgoing.message_type,
                media_url: outgoing.media_url,
                direction: MessageDirection::Outbound,
                status: MessageStatus::Sent,
                metadata: outgoing.metadata,
            })
            .await
            .map_err(|e| ParleyError::MessagePersistence(Box::new(e)))?;

        if let Err(e) = self.conversations.touch_last_message(conversation_id).await {
            tracing::warn!(conversation_id, error = %e, "failed to update conversation last message");
        }

        self.notifier.notify(
            catalog::MESSAGE_NEW,
            message_payload(&message, conversation.channel_id),
        );
        Ok(message)
    }

    /// Receipts are not checked for order: `read` may precede `delivered`.
    pub async fn mark_delivered(&self, message_id: i64) -> Result<(), ParleyError> {
        self.transition(message_id, MessageStatus::Delivered, catalog::MESSAGE_DELIVERED)
            .await
    }

    pub async fn mark_read(&self, message_id: i64) -> Result<(), ParleyError> {
        self.transition(message_id, MessageStatus::Read, catalog::MESSAGE_READ)
            .await
    }

    async fn transition(
        &self,
        message_id: i64,
        status: MessageStatus,
        event_type: &str,
    ) -> Result<(), ParleyError> {
        self.messages.update_status(message_id, status).await?;

        let mut payload = Map::new();
        payload.insert("message_id".into(), json!(message_id));
        payload.insert("status".into(), json!(status));
        self.notifier.notify(event_type, payload);
        Ok(())
    }

    /// Newest first. Fails with not-found for an unknown conversation.
    pub async fn history(
        &self,
        conversation_id: i64,
        query: MessageQuery,
    ) -> Result<Vec<Message>, ParleyError> {
        if self.conversations.get_by_id(conversation_id).await?.is_none() {
            return Err(ParleyError::conversation_not_found(conversation_id));
        }
        self.messages.list_by_conversation(conversation_id, &query).await
    }
}
