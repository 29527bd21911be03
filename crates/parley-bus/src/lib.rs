// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification bus for parley.
//!
//! Services hold a [`Notifier`] and call [`Notifier::notify`], which queues the
//! event and returns immediately. A single worker task hands queued events to
//! an [`EventSink`](parley_core::EventSink) under a timeout: Redis pub/sub in
//! production, an in-process broadcast channel for embedding and tests, or
//! nothing at all when events are disabled.

pub mod catalog;
pub mod notifier;
pub mod redis_sink;
pub mod sink;

pub use notifier::{Notifier, NotifierHandle};
pub use redis_sink::RedisSink;
pub use sink::{BroadcastSink, NoopSink};
