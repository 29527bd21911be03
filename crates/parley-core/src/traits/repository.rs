// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository contracts for the four entities the pipeline mutates.
//!
//! Lookups by id return `Ok(None)` on a miss. Updates addressed at a missing
//! row return [`ParleyError::NotFound`]. List operations normalize their
//! limit and offset through [`crate::pagination`] before touching storage.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{
    Conversation, ConversationQuery, ConversationUpdate, ExternalUser, ExternalUserUpdate,
    Message, MessageQuery, MessageStatus, NewConversation, NewExternalUser, NewMessage,
    NewWebhookEvent, WebhookEvent,
};

#[async_trait]
pub trait ExternalUserRepository: Send + Sync {
    async fn create(&self, user: &NewExternalUser) -> Result<ExternalUser, ParleyError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ExternalUser>, ParleyError>;

    async fn get_by_channel_and_platform_id(
        &self,
        channel_id: i64,
        platform_user_id: &str,
    ) -> Result<Option<ExternalUser>, ParleyError>;

    /// Look up by `(channel_id, platform_user_id)`; create on a miss.
    ///
    /// A hit touches `last_seen_at`. Repeated calls with the same identity
    /// return the same row.
    async fn find_or_create(&self, user: &NewExternalUser) -> Result<ExternalUser, ParleyError>;

    async fn update(
        &self,
        id: i64,
        update: &ExternalUserUpdate,
    ) -> Result<ExternalUser, ParleyError>;

    async fn touch_last_seen(&self, id: i64) -> Result<(), ParleyError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create(&self, conversation: &NewConversation) -> Result<Conversation, ParleyError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Conversation>, ParleyError>;

    /// Reuse the most recently created open or pending conversation for the
    /// pair, or create a new open one with normal priority.
    ///
    /// The flag is `true` when a conversation was created.
    async fn get_or_create_open_for_user(
        &self,
        channel_id: i64,
        external_user_id: i64,
    ) -> Result<(Conversation, bool), ParleyError>;

    /// Conversations on a channel, most recently updated first.
    async fn list(
        &self,
        channel_id: i64,
        query: &ConversationQuery,
    ) -> Result<Vec<Conversation>, ParleyError>;

    /// Apply a partial update. Always bumps `updated_at`; a resolved or
    /// closed status also stamps `resolved_at`.
    async fn update(
        &self,
        id: i64,
        update: &ConversationUpdate,
    ) -> Result<Conversation, ParleyError>;

    /// Set `last_message_at` to now, and `first_message_at` if still unset.
    async fn touch_last_message(&self, id: i64) -> Result<(), ParleyError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, message: &NewMessage) -> Result<Message, ParleyError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Message>, ParleyError>;

    /// Newest first, ties broken by descending id.
    async fn list_by_conversation(
        &self,
        conversation_id: i64,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, ParleyError>;

    /// Set the status and stamp `delivered_at` / `read_at` to match.
    async fn update_status(&self, id: i64, status: MessageStatus) -> Result<(), ParleyError>;
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    async fn create(&self, event: &NewWebhookEvent) -> Result<WebhookEvent, ParleyError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<WebhookEvent>, ParleyError>;

    /// Events never finalized, oldest first.
    async fn list_unprocessed(
        &self,
        channel_id: i64,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, ParleyError>;

    /// Events finalized with an error, newest first.
    async fn list_failed(
        &self,
        channel_id: i64,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, ParleyError>;

    async fn mark_processed(&self, id: i64) -> Result<(), ParleyError>;

    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), ParleyError>;
}
