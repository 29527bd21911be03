// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits at the seams between services and their collaborators.
//!
//! Services depend on these traits only, never on a concrete storage engine
//! or bus client.

pub mod adapter;
pub mod events;
pub mod repository;
pub mod storage;

pub use adapter::PluginAdapter;
pub use events::EventSink;
pub use repository::{
    ConversationRepository, ExternalUserRepository, MessageRepository, WebhookEventRepository,
};
pub use storage::StorageAdapter;
