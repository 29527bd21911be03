// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory repository fake.
//!
//! Follows the same rules as the SQLite backend (pagination, ordering,
//! not-found on updates, conversation reuse) without a database, and can be
//! told to fail selected operations so error paths are reachable in tests.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use parley_core::pagination::{
    DEFAULT_LIMIT, MESSAGE_DEFAULT_LIMIT, normalize_limit, normalize_offset,
};
use parley_core::types::{
    Conversation, ConversationQuery, ConversationUpdate, ExternalUser, ExternalUserUpdate,
    Message, MessageQuery, MessageStatus, NewConversation, NewExternalUser, NewMessage,
    NewWebhookEvent, WebhookEvent,
};
use parley_core::{
    ConversationRepository, ExternalUserRepository, MessageRepository, ParleyError,
    WebhookEventRepository,
};

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    FindOrCreateUser,
    TouchLastSeen,
    GetOrCreateConversation,
    TouchLastMessage,
    CreateMessage,
    CreateWebhookEvent,
    FinalizeWebhookEvent,
}

#[derive(Default)]
struct State {
    users: Vec<ExternalUser>,
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    webhook_events: Vec<WebhookEvent>,
    failing: HashSet<FailPoint>,
}

impl State {
    fn check(&self, point: FailPoint) -> Result<(), ParleyError> {
        if self.failing.contains(&point) {
            Err(ParleyError::storage(std::io::Error::other(format!(
                "injected failure: {point:?}"
            ))))
        } else {
            Ok(())
        }
    }

    fn insert_user(&mut self, new: &NewExternalUser) -> ExternalUser {
        let now = Utc::now();
        let user = ExternalUser {
            id: self.users.len() as i64 + 1,
            channel_id: new.channel_id,
            platform_user_id: new.platform_user_id.clone(),
            platform_username: new.platform_username.clone(),
            display_name: new.display_name.clone(),
            phone_number: new.phone_number.clone(),
            email: new.email.clone(),
            avatar_url: new.avatar_url.clone(),
            metadata: new.metadata.clone(),
            first_seen_at: now,
            last_seen_at: now,
            is_blocked: false,
        };
        self.users.push(user.clone());
        user
    }

    fn insert_conversation(&mut self, new: &NewConversation) -> Conversation {
        let now = Utc::now();
        let conversation = Conversation {
            id: self.conversations.len() as i64 + 1,
            channel_id: new.channel_id,
            external_user_id: new.external_user_id,
            assignee_id: new.assignee_id.clone(),
            status: new.status,
            priority: new.priority,
            subject: new.subject.clone(),
            metadata: new.metadata.clone(),
            first_message_at: None,
            last_message_at: None,
            resolved_at: new.status.stamps_resolution().then_some(now),
            created_at: now,
            updated_at: now,
        };
        self.conversations.push(conversation.clone());
        conversation
    }

    fn user_mut(&mut self, id: i64) -> Result<&mut ExternalUser, ParleyError> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(ParleyError::NotFound {
                entity: "external user",
                id,
            })
    }

    fn conversation_mut(&mut self, id: i64) -> Result<&mut Conversation, ParleyError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ParleyError::conversation_not_found(id))
    }

    fn webhook_event_mut(&mut self, id: i64) -> Result<&mut WebhookEvent, ParleyError> {
        self.webhook_events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(ParleyError::NotFound {
                entity: "webhook event",
                id,
            })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `point` fail until [`recover`](Self::recover) is called.
    pub async fn fail(&self, point: FailPoint) {
        self.state.lock().await.failing.insert(point);
    }

    pub async fn recover(&self, point: FailPoint) {
        self.state.lock().await.failing.remove(&point);
    }

    pub async fn users(&self) -> Vec<ExternalUser> {
        self.state.lock().await.users.clone()
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().await.conversations.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    pub async fn webhook_events(&self) -> Vec<WebhookEvent> {
        self.state.lock().await.webhook_events.clone()
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl ExternalUserRepository for MemoryStore {
    async fn create(&self, user: &NewExternalUser) -> Result<ExternalUser, ParleyError> {
        let mut state = self.state.lock().await;
        let duplicate = state.users.iter().any(|u| {
            u.channel_id == user.channel_id && u.platform_user_id == user.platform_user_id
        });
        if duplicate {
            return Err(ParleyError::Validation(format!(
                "external user {} already exists on channel {}",
                user.platform_user_id, user.channel_id
            )));
        }
        Ok(state.insert_user(user))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ExternalUser>, ParleyError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_channel_and_platform_id(
        &self,
        channel_id: i64,
        platform_user_id: &str,
    ) -> Result<Option<ExternalUser>, ParleyError> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.channel_id == channel_id && u.platform_user_id == platform_user_id)
            .cloned())
    }

    async fn find_or_create(&self, user: &NewExternalUser) -> Result<ExternalUser, ParleyError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::FindOrCreateUser)?;

        let existing = state.users.iter_mut().find(|u| {
            u.channel_id == user.channel_id && u.platform_user_id == user.platform_user_id
        });
        match existing {
            Some(found) => {
                found.last_seen_at = Utc::now();
                Ok(found.clone())
            }
            None => Ok(state.insert_user(user)),
        }
    }

    async fn update(
        &self,
        id: i64,
        update: &ExternalUserUpdate,
    ) -> Result<ExternalUser, ParleyError> {
        let mut state = self.state.lock().await;
        let user = state.user_mut(id)?;
        if let Some(v) = &update.platform_username {
            user.platform_username = Some(v.clone());
        }
        if let Some(v) = &update.display_name {
            user.display_name = Some(v.clone());
        }
        if let Some(v) = &update.phone_number {
            user.phone_number = Some(v.clone());
        }
        if let Some(v) = &update.email {
            user.email = Some(v.clone());
        }
        if let Some(v) = &update.avatar_url {
            user.avatar_url = Some(v.clone());
        }
        if let Some(v) = &update.metadata {
            user.metadata = Some(v.clone());
        }
        if let Some(v) = update.is_blocked {
            user.is_blocked = v;
        }
        Ok(user.clone())
    }

    async fn touch_last_seen(&self, id: i64) -> Result<(), ParleyError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::TouchLastSeen)?;
        state.user_mut(id)?.last_seen_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn create(&self, conversation: &NewConversation) -> Result<Conversation, ParleyError> {
        Ok(self.state.lock().await.insert_conversation(conversation))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Conversation>, ParleyError> {
        let state = self.state.lock().await;
        Ok(state.conversations.iter().find(|c| c.id == id).cloned())
    }

    async fn get_or_create_open_for_user(
        &self,
        channel_id: i64,
        external_user_id: i64,
    ) -> Result<(Conversation, bool), ParleyError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::GetOrCreateConversation)?;

        let reusable = state
            .conversations
            .iter()
            .filter(|c| {
                c.channel_id == channel_id
                    && c.external_user_id == external_user_id
                    && c.status.is_active()
            })
            .max_by_key(|c| (c.created_at, c.id))
            .cloned();
        if let Some(found) = reusable {
            return Ok((found, false));
        }

        let created = state.insert_conversation(&NewConversation {
            channel_id,
            external_user_id,
            ..NewConversation::default()
        });
        Ok((created, true))
    }

    async fn list(
        &self,
        channel_id: i64,
        query: &ConversationQuery,
    ) -> Result<Vec<Conversation>, ParleyError> {
        let state = self.state.lock().await;
        let mut found: Vec<Conversation> = state
            .conversations
            .iter()
            .filter(|c| c.channel_id == channel_id)
            .filter(|c| query.status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.updated_at, b.id).cmp(&(a.updated_at, a.id)));
        Ok(page(
            found,
            normalize_limit(query.limit, DEFAULT_LIMIT),
            normalize_offset(query.offset),
        ))
    }

    async fn update(
        &self,
        id: i64,
        update: &ConversationUpdate,
    ) -> Result<Conversation, ParleyError> {
        let mut state = self.state.lock().await;
        let conversation = state.conversation_mut(id)?;
        let now = Utc::now();
        if let Some(v) = &update.assignee_id {
            conversation.assignee_id = Some(v.clone());
        }
        if let Some(status) = update.status {
            conversation.status = status;
            if status.stamps_resolution() {
                conversation.resolved_at = Some(now);
            }
        }
        if let Some(priority) = update.priority {
            conversation.priority = priority;
        }
        if let Some(v) = &update.subject {
            conversation.subject = Some(v.clone());
        }
        if let Some(v) = &update.metadata {
            conversation.metadata = Some(v.clone());
        }
        conversation.updated_at = now;
        Ok(conversation.clone())
    }

    async fn touch_last_message(&self, id: i64) -> Result<(), ParleyError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::TouchLastMessage)?;
        let conversation = state.conversation_mut(id)?;
        let now = Utc::now();
        conversation.first_message_at.get_or_insert(now);
        conversation.last_message_at = Some(now);
        conversation.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create(&self, message: &NewMessage) -> Result<Message, ParleyError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::CreateMessage)?;
        if !state
            .conversations
            .iter()
            .any(|c| c.id == message.conversation_id)
        {
            return Err(ParleyError::conversation_not_found(message.conversation_id));
        }

        let stored = Message {
            id: state.messages.len() as i64 + 1,
            conversation_id: message.conversation_id,
            platform_message_id: message.platform_message_id.clone(),
            sender_type: message.sender_type,
            sender_id: message.sender_id,
            content: message.content.clone(),
            message_type: message.message_type,
            media_url: message.media_url.clone(),
            direction: message.direction,
            status: message.status,
            created_at: Utc::now(),
            delivered_at: None,
            read_at: None,
            metadata: message.metadata.clone(),
        };
        state.messages.push(stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Message>, ParleyError> {
        let state = self.state.lock().await;
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_by_conversation(
        &self,
        conversation_id: i64,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, ParleyError> {
        let state = self.state.lock().await;
        let mut found: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| query.before_id.is_none_or(|before| m.id < before))
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(page(
            found,
            normalize_limit(query.limit, MESSAGE_DEFAULT_LIMIT),
            normalize_offset(query.offset),
        ))
    }

    async fn update_status(&self, id: i64, status: MessageStatus) -> Result<(), ParleyError> {
        let mut state = self.state.lock().await;
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| ParleyError::message_not_found(id))?;
        let now = Utc::now();
        message.status = status;
        match status {
            MessageStatus::Delivered => message.delivered_at = Some(now),
            MessageStatus::Read => message.read_at = Some(now),
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookEventRepository for MemoryStore {
    async fn create(&self, event: &NewWebhookEvent) -> Result<WebhookEvent, ParleyError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::CreateWebhookEvent)?;
        let stored = WebhookEvent {
            id: state.webhook_events.len() as i64 + 1,
            channel_id: event.channel_id,
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            processed: false,
            created_at: Utc::now(),
            processed_at: None,
            error: None,
        };
        state.webhook_events.push(stored.clone());
        Ok(stored)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<WebhookEvent>, ParleyError> {
        let state = self.state.lock().await;
        Ok(state.webhook_events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_unprocessed(
        &self,
        channel_id: i64,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, ParleyError> {
        let state = self.state.lock().await;
        let found: Vec<WebhookEvent> = state
            .webhook_events
            .iter()
            .filter(|e| e.channel_id == channel_id && !e.processed)
            .cloned()
            .collect();
        Ok(page(found, normalize_limit(limit, DEFAULT_LIMIT), 0))
    }

    async fn list_failed(
        &self,
        channel_id: i64,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, ParleyError> {
        let state = self.state.lock().await;
        let mut found: Vec<WebhookEvent> = state
            .webhook_events
            .iter()
            .filter(|e| e.channel_id == channel_id && e.processed && e.error.is_some())
            .cloned()
            .collect();
        found.sort_by(|a, b| (b.processed_at, b.id).cmp(&(a.processed_at, a.id)));
        Ok(page(found, normalize_limit(limit, DEFAULT_LIMIT), 0))
    }

    async fn mark_processed(&self, id: i64) -> Result<(), ParleyError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::FinalizeWebhookEvent)?;
        let event = state.webhook_event_mut(id)?;
        event.processed = true;
        event.processed_at = Some(Utc::now());
        event.error = None;
        Ok(())
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), ParleyError> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::FinalizeWebhookEvent)?;
        let event = state.webhook_event_mut(id)?;
        event.processed = true;
        event.processed_at = Some(Utc::now());
        event.error = Some(error.to_string());
        Ok(())
    }
}
