// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation triage: reads, assignment, status, and priority.

use std::sync::Arc;

use parley_bus::{Notifier, catalog};
use parley_core::types::{
    Conversation, ConversationPriority, ConversationQuery, ConversationStatus, ConversationUpdate,
};
use parley_core::{ConversationRepository, ParleyError};
use serde_json::{Map, json};

use crate::repositories::Repositories;

#[derive(Clone)]
pub struct ConversationService {
    conversations: Arc<dyn ConversationRepository>,
    notifier: Notifier,
}

impl ConversationService {
    pub fn new(repos: &Repositories, notifier: Notifier) -> Self {
        Self {
            conversations: repos.conversations.clone(),
            notifier,
        }
    }

    pub async fn get(&self, id: i64) -> Result<Conversation, ParleyError> {
        self.conversations
            .get_by_id(id)
            .await?
            .ok_or_else(|| ParleyError::conversation_not_found(id))
    }

    pub async fn list_by_channel(
        &self,
        channel_id: i64,
        query: ConversationQuery,
    ) -> Result<Vec<Conversation>, ParleyError> {
        self.conversations.list(channel_id, &query).await
    }

    pub async fn assign(&self, id: i64, assignee: &str) -> Result<Conversation, ParleyError> {
        let assignee = assignee.trim();
        if assignee.is_empty() {
            return Err(ParleyError::Validation("assignee_id is required".into()));
        }
        self.apply(
            id,
            ConversationUpdate {
                assignee_id: Some(assignee.to_string()),
                ..ConversationUpdate::default()
            },
        )
        .await
    }

    /// Resolved and closed stamp `resolved_at`. A later inbound message from
    /// the same user opens a fresh conversation.
    pub async fn update_status(
        &self,
        id: i64,
        status: ConversationStatus,
    ) -> Result<Conversation, ParleyError> {
        self.apply(
            id,
            ConversationUpdate {
                status: Some(status),
                ..ConversationUpdate::default()
            },
        )
        .await
    }

    pub async fn update_priority(
        &self,
        id: i64,
        priority: ConversationPriority,
    ) -> Result<Conversation, ParleyError> {
        self.apply(
            id,
            ConversationUpdate {
                priority: Some(priority),
                ..ConversationUpdate::default()
            },
        )
        .await
    }

    async fn apply(
        &self,
        id: i64,
        update: ConversationUpdate,
    ) -> Result<Conversation, ParleyError> {
        let conversation = self.conversations.update(id, &update).await?;

        let mut payload = Map::new();
        payload.insert("conversation_id".into(), json!(conversation.id));
        payload.insert("channel_id".into(), json!(conversation.channel_id));
        payload.insert("status".into(), json!(conversation.status));
        payload.insert("priority".into(), json!(conversation.priority));
        if let Some(assignee) = &conversation.assignee_id {
            payload.insert("assignee_id".into(), json!(assignee));
        }
        self.notifier.notify(catalog::CONVERSATION_UPDATED, payload);

        tracing::debug!(conversation_id = id, "conversation updated");
        Ok(conversation)
    }
}
