// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for parley.
//!
//! Holds the domain model, the shared error type, pagination rules, and the
//! traits that separate the messaging services from storage and the event
//! bus.

pub mod error;
pub mod pagination;
pub mod traits;
pub mod types;

pub use error::ParleyError;
pub use types::{AdapterType, EventEnvelope, HealthStatus};

pub use traits::{
    ConversationRepository, EventSink, ExternalUserRepository, MessageRepository, PluginAdapter,
    StorageAdapter, WebhookEventRepository,
};
