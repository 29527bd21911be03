// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use parley_core::{
    ConversationRepository, ExternalUserRepository, MessageRepository, WebhookEventRepository,
};

/// The four repositories the services write to.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn ExternalUserRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
}

impl Repositories {
    /// Use one backend for every repository.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ExternalUserRepository
            + ConversationRepository
            + MessageRepository
            + WebhookEventRepository
            + 'static,
    {
        Self {
            users: store.clone(),
            conversations: store.clone(),
            messages: store.clone(),
            webhook_events: store,
        }
    }
}
