// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable event names. Subscribers match on these strings.

pub const REQUEST_NEW: &str = "chat.request.new";
pub const REQUEST_ACCEPTED: &str = "chat.request.accepted";
pub const REQUEST_REJECTED: &str = "chat.request.rejected";

pub const MESSAGE_NEW: &str = "chat.message.new";
pub const MESSAGE_DELIVERED: &str = "chat.message.delivered";
pub const MESSAGE_READ: &str = "chat.message.read";

pub const CONVERSATION_CREATED: &str = "chat.conversation.created";
pub const CONVERSATION_UPDATED: &str = "chat.conversation.updated";

pub const USER_ONLINE: &str = "chat.user.online";
pub const USER_OFFLINE: &str = "chat.user.offline";

/// Every name above, for validation and listings.
pub const ALL: &[&str] = &[
    REQUEST_NEW,
    REQUEST_ACCEPTED,
    REQUEST_REJECTED,
    MESSAGE_NEW,
    MESSAGE_DELIVERED,
    MESSAGE_READ,
    CONVERSATION_CREATED,
    CONVERSATION_UPDATED,
    USER_ONLINE,
    USER_OFFLINE,
];
