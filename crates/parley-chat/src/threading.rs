// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threads inbound messages onto users and conversations.

use std::sync::Arc;

use parley_bus::{Notifier, catalog};
use parley_core::types::{
    Conversation, Message, MessageDirection, MessageStatus, NewExternalUser, NewMessage,
    SenderType,
};
use parley_core::{ConversationRepository, ExternalUserRepository, MessageRepository, ParleyError};
use serde_json::{Map, Value, json};

use crate::payload::InboundMessage;
use crate::repositories::Repositories;

#[derive(Clone)]
pub struct ThreadingService {
    users: Arc<dyn ExternalUserRepository>,
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    notifier: Notifier,
}

impl ThreadingService {
    pub fn new(repos: &Repositories, notifier: Notifier) -> Self {
        Self {
            users: repos.users.clone(),
            conversations: repos.conversations.clone(),
            messages: repos.messages.clone(),
            notifier,
        }
    }

    /// Resolve user, then conversation, then append the message.
    ///
    /// The three writes are sequential, not transactional: a failure after
    /// the user or conversation was created leaves them in place. Recency
    /// updates and notifications never fail the call.
    pub async fn process_incoming(
        &self,
        channel_id: i64,
        inbound: InboundMessage,
    ) -> Result<Message, ParleyError> {
        let user = self
            .users
            .find_or_create(&NewExternalUser {
                channel_id,
                platform_user_id: inbound.platform_user_id.clone(),
                display_name: inbound.user_name.clone(),
                phone_number: inbound.user_phone.clone(),
                email: inbound.user_email.clone(),
                ..NewExternalUser::default()
            })
            .await
            .map_err(|e| ParleyError::UserResolution(Box::new(e)))?;

        let (conversation, created) = self
            .conversations
            .get_or_create_open_for_user(channel_id, user.id)
            .await
            .map_err(|e| ParleyError::ConversationResolution(Box::new(e)))?;
        if created {
            tracing::info!(
                conversation_id = conversation.id,
                channel_id,
                external_user_id = user.id,
                "conversation opened"
            );
            self.notifier
                .notify(catalog::CONVERSATION_CREATED, created_payload(&conversation));
        }

        let message = self
            .messages
            .create(&NewMessage {
                conversation_id: conversation.id,
                platform_message_id: inbound.platform_message_id,
                sender_type: SenderType::External,
                sender_id: Some(user.id),
                content: inbound.content,
                message_type: inbound.message_type,
                media_url: inbound.media_url,
                direction: MessageDirection::Inbound,
                status: MessageStatus::Received,
                metadata: None,
            })
            .await
            .map_err(|e| ParleyError::MessagePersistence(Box::new(e)))?;

        if let Err(e) = self.conversations.touch_last_message(conversation.id).await {
            tracing::warn!(
                conversation_id = conversation.id,
                error = %e,
                "failed to update conversation last message"
            );
        }
        if let Err(e) = self.users.touch_last_seen(user.id).await {
            tracing::warn!(external_user_id = user.id, error = %e, "failed to update user last seen");
        }

        let mut payload = message_payload(&message, channel_id);
        payload.insert("external_user_id".into(), json!(user.id));
        self.notifier.notify(catalog::MESSAGE_NEW, payload);

        tracing::debug!(
            message_id = message.id,
            conversation_id = conversation.id,
            channel_id,
            "inbound message stored"
        );
        Ok(message)
    }
}

/// Body of a `chat.message.new` notification.
pub(crate) fn message_payload(message: &Message, channel_id: i64) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("message_id".into(), json!(message.id));
    payload.insert("conversation_id".into(), json!(message.conversation_id));
    payload.insert("channel_id".into(), json!(channel_id));
    payload.insert("content".into(), json!(message.content));
    payload.insert("message_type".into(), json!(message.message_type));
    payload.insert("direction".into(), json!(message.direction));
    payload.insert("timestamp".into(), json!(message.created_at));
    payload
}

fn created_payload(conversation: &Conversation) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("conversation_id".into(), json!(conversation.id));
    payload.insert("channel_id".into(), json!(conversation.channel_id));
    payload.insert(
        "external_user_id".into(),
        json!(conversation.external_user_id),
    );
    payload.insert("status".into(), json!(conversation.status));
    payload.insert("priority".into(), json!(conversation.priority));
    payload
}
