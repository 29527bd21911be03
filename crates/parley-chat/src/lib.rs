// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging services for parley.
//!
//! [`WebhookPipeline`] is the single entry point for platform callbacks: it
//! records every call in the webhook audit log, dispatches by event type, and
//! finalizes the record with the outcome. Inbound messages are threaded by
//! [`ThreadingService`]; replies and delivery receipts go through
//! [`OutboundService`]; triage (assignment, status, priority) through
//! [`ConversationService`].
//!
//! Every service depends only on the repository traits in `parley-core` and
//! emits notifications through a [`parley_bus::Notifier`].

pub mod conversation;
pub mod outbound;
pub mod payload;
pub mod repositories;
pub mod threading;
pub mod webhook;

pub use conversation::ConversationService;
pub use outbound::{OutboundService, OutgoingMessage};
pub use payload::{InboundMessage, Receipt, StatusReceipt};
pub use repositories::Repositories;
pub use threading::ThreadingService;
pub use webhook::WebhookPipeline;

use parley_bus::Notifier;

/// Every service, wired to one set of repositories and one notifier.
#[derive(Clone)]
pub struct ChatServices {
    pub webhooks: WebhookPipeline,
    pub threading: ThreadingService,
    pub outbound: OutboundService,
    pub conversations: ConversationService,
}

impl ChatServices {
    pub fn new(repos: Repositories, notifier: Notifier) -> Self {
        let threading = ThreadingService::new(&repos, notifier.clone());
        let outbound = OutboundService::new(&repos, notifier.clone());
        let conversations = ConversationService::new(&repos, notifier);
        let webhooks = WebhookPipeline::new(
            repos.webhook_events.clone(),
            threading.clone(),
            outbound.clone(),
        );
        Self {
            webhooks,
            threading,
            outbound,
            conversations,
        }
    }
}
