// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model shared across parley crates.
//!
//! Row types (`Organization`, `Channel`, `ExternalUser`, `Conversation`,
//! `Message`, `WebhookEvent`) mirror persisted state. `New*` types carry the
//! caller-supplied fields for inserts; `*Update` types carry partial updates
//! where `None` means "leave unchanged".

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a `PluginAdapter`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    EventSink,
}

// --- Organizations and channels ---

/// Tenant root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Messaging platform a channel is integrated with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Whatsapp,
    Telegram,
    Instagram,
    Facebook,
    Sms,
    Email,
    Web,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Pending,
    Active,
    Inactive,
    Error,
}

/// One platform integration owned by an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub organization_id: i64,
    pub platform: Platform,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_identifier: Option<String>,
    pub status: ChannelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
    /// Platform credential. Never leaves the process.
    #[serde(skip_serializing, default)]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct NewChannel {
    pub organization_id: i64,
    pub platform: Platform,
    pub name: String,
    pub account_identifier: Option<String>,
    pub webhook_secret: Option<String>,
    pub access_token: Option<String>,
    pub config: Option<Value>,
}

// --- External users ---

/// A platform-native end-user as seen through one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalUser {
    pub id: i64,
    pub channel_id: i64,
    pub platform_user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewExternalUser {
    pub channel_id: i64,
    pub platform_user_id: String,
    pub platform_username: Option<String>,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalUserUpdate {
    pub platform_username: Option<String>,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub metadata: Option<Value>,
    pub is_blocked: Option<bool>,
}

impl ExternalUserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// --- Conversations ---

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Open,
    Pending,
    Resolved,
    Closed,
}

impl ConversationStatus {
    /// Statuses eligible for reuse when threading a new inbound message.
    pub const ACTIVE: [ConversationStatus; 2] =
        [ConversationStatus::Open, ConversationStatus::Pending];

    pub fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::Pending)
    }

    /// Resolved and closed conversations stamp `resolved_at`.
    pub fn stamps_resolution(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConversationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A thread of messages between one external user and one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub channel_id: i64,
    pub external_user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    pub status: ConversationStatus,
    pub priority: ConversationPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewConversation {
    pub channel_id: i64,
    pub external_user_id: i64,
    pub status: ConversationStatus,
    pub priority: ConversationPriority,
    pub assignee_id: Option<String>,
    pub subject: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationUpdate {
    pub assignee_id: Option<String>,
    pub status: Option<ConversationStatus>,
    pub priority: Option<ConversationPriority>,
    pub subject: Option<String>,
    pub metadata: Option<Value>,
}

/// Filter and paging for conversation listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationQuery {
    pub status: Option<ConversationStatus>,
    pub limit: i64,
    pub offset: i64,
}

// --- Messages ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    External,
    Internal,
    System,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    File,
    Location,
    Contact,
    Sticker,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Inbound,
    Outbound,
}

/// Message lifecycle: `received|sent -> delivered -> read`, plus `failed`.
///
/// Transitions are not checked; receipts may arrive out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Received,
    Sent,
    Delivered,
    Read,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_message_id: Option<String>,
    pub sender_type: SenderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
    pub content: String,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub direction: MessageDirection,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub platform_message_id: Option<String>,
    pub sender_type: SenderType,
    pub sender_id: Option<i64>,
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub direction: MessageDirection,
    pub status: MessageStatus,
    pub metadata: Option<Value>,
}

/// Paging for message history reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageQuery {
    pub limit: i64,
    pub offset: i64,
    /// Only messages with an id strictly below this one.
    pub before_id: Option<i64>,
}

// --- Webhook events ---

/// Append-only audit record of one inbound webhook call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: i64,
    pub channel_id: i64,
    pub event_type: String,
    /// The payload exactly as serialized on receipt.
    pub payload: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWebhookEvent {
    pub channel_id: i64,
    pub event_type: String,
    pub payload: String,
}

// --- Notification envelopes ---

/// Wire envelope for every published notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// `<type>-<unix nanos>`; unique enough for at-least-once consumers.
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub payload: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl EventEnvelope {
    pub fn new(
        event_type: &str,
        source: &str,
        payload: serde_json::Map<String, Value>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        let timestamp = Utc::now();
        let nanos = timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| timestamp.timestamp_micros().saturating_mul(1_000));
        Self {
            id: format!("{event_type}-{nanos}"),
            event_type: event_type.to_string(),
            timestamp,
            source: source.to_string(),
            payload,
            metadata,
        }
    }
}
