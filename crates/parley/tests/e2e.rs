// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the webhook pipeline over real SQLite.
//!
//! Each test creates an isolated TestHarness with a temp database and a
//! recording event sink. Tests are independent and order-insensitive.

use std::time::Duration;

use parley_bus::catalog;
use parley_core::types::{
    ConversationQuery, ConversationStatus, MessageDirection, MessageQuery, MessageStatus,
};
use parley_core::{
    ConversationRepository, ExternalUserRepository, MessageRepository, WebhookEventRepository,
};
use parley_test_utils::TestHarness;
use serde_json::json;

const WAIT: Duration = Duration::from_secs(2);

fn ana_says(content: &str) -> serde_json::Value {
    json!({
        "event_type": "message",
        "user_id": "wa-42",
        "user_name": "Ana",
        "content": content,
        "message_type": "text",
    })
}

// ---- Scenario: first inbound message ----

#[tokio::test]
async fn test_first_message_creates_user_conversation_and_message() {
    let harness = TestHarness::new().await.unwrap();
    assert_eq!(harness.organization.slug, "acme");
    assert_eq!(harness.channel.name, "c1");
    let channel = harness.channel_id();

    harness
        .services
        .webhooks
        .process_webhook(channel, "message", &ana_says("hi"))
        .await
        .unwrap();

    let storage = harness.storage.as_ref();
    let user = ExternalUserRepository::get_by_channel_and_platform_id(storage, channel, "wa-42")
        .await
        .unwrap()
        .expect("user should exist");
    assert_eq!(user.display_name.as_deref(), Some("Ana"));

    let conversations = ConversationRepository::list(
        storage,
        channel,
        &ConversationQuery {
            limit: 100,
            ..ConversationQuery::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].status, ConversationStatus::Open);
    assert_eq!(conversations[0].external_user_id, user.id);

    let messages = MessageRepository::list_by_conversation(
        storage,
        conversations[0].id,
        &MessageQuery {
            limit: 50,
            ..MessageQuery::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, MessageDirection::Inbound);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[0].status, MessageStatus::Received);

    let event = WebhookEventRepository::get_by_id(storage, 1)
        .await
        .unwrap()
        .expect("webhook event should be recorded");
    assert!(event.processed);
    assert!(event.error.is_none());
    assert!(
        WebhookEventRepository::list_failed(storage, channel, 10)
            .await
            .unwrap()
            .is_empty()
    );

    harness.events.wait_for_events(2, WAIT).await;
    let new_messages = harness.events.events_of(catalog::MESSAGE_NEW).await;
    assert_eq!(new_messages.len(), 1);
    assert_eq!(new_messages[0].payload["content"], json!("hi"));
    assert_eq!(new_messages[0].payload["external_user_id"], json!(user.id));
    assert_eq!(
        harness
            .events
            .events_of(catalog::CONVERSATION_CREATED)
            .await
            .len(),
        1
    );

    harness.shutdown().await.unwrap();
}

// ---- Scenario: delivery receipt for that message ----

#[tokio::test]
async fn test_status_update_marks_message_delivered() {
    let harness = TestHarness::new().await.unwrap();
    let channel = harness.channel_id();
    let webhooks = &harness.services.webhooks;

    webhooks
        .process_webhook(channel, "message", &ana_says("hi"))
        .await
        .unwrap();
    let message_id = 1;

    webhooks
        .process_webhook(
            channel,
            "status_update",
            &json!({"event_type": "status_update", "message_id": message_id, "status": "delivered"}),
        )
        .await
        .unwrap();

    let message = MessageRepository::get_by_id(harness.storage.as_ref(), message_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.status, MessageStatus::Delivered);
    assert!(message.delivered_at.is_some());
    assert!(message.read_at.is_none());

    let events = harness.events.wait_for_events(4, WAIT).await;
    let delivered: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == catalog::MESSAGE_DELIVERED)
        .collect();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].payload["message_id"], json!(message_id));
    assert_eq!(delivered[0].payload["status"], json!("delivered"));

    harness.shutdown().await.unwrap();
}

// ---- Conversation reuse ----

#[tokio::test]
async fn test_messages_thread_until_conversation_closes() {
    let harness = TestHarness::new().await.unwrap();
    let channel = harness.channel_id();
    let webhooks = &harness.services.webhooks;

    webhooks
        .process_webhook(channel, "message", &ana_says("one"))
        .await
        .unwrap();
    webhooks
        .process_webhook(channel, "message", &ana_says("two"))
        .await
        .unwrap();

    let listed = harness
        .services
        .conversations
        .list_by_channel(channel, ConversationQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    let first = listed[0].id;

    harness
        .services
        .conversations
        .update_status(first, ConversationStatus::Closed)
        .await
        .unwrap();
    webhooks
        .process_webhook(channel, "message", &ana_says("three"))
        .await
        .unwrap();

    let listed = harness
        .services
        .conversations
        .list_by_channel(channel, ConversationQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    let reopened = listed.iter().find(|c| c.id != first).unwrap();
    assert_eq!(reopened.status, ConversationStatus::Open);
    assert_eq!(reopened.external_user_id, listed[0].external_user_id);

    let history = harness
        .services
        .outbound
        .history(first, MessageQuery::default())
        .await
        .unwrap();
    let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["two", "one"]);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_user_resolution_is_idempotent() {
    let harness = TestHarness::new().await.unwrap();
    let channel = harness.channel_id();

    for n in 0..3 {
        harness
            .services
            .webhooks
            .process_webhook(channel, "message", &ana_says(&format!("msg {n}")))
            .await
            .unwrap();
    }

    let storage = harness.storage.as_ref();
    let user = ExternalUserRepository::get_by_channel_and_platform_id(storage, channel, "wa-42")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.id, 1);
    assert!(
        ExternalUserRepository::get_by_id(storage, 2)
            .await
            .unwrap()
            .is_none()
    );

    harness.shutdown().await.unwrap();
}

// ---- Failures are recorded ----

#[tokio::test]
async fn test_missing_fields_are_recorded_on_the_audit_row() {
    let harness = TestHarness::new().await.unwrap();
    let channel = harness.channel_id();

    let err = harness
        .services
        .webhooks
        .process_webhook(channel, "message", &json!({"user_id": "wa-42"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing required fields"));

    let failed = WebhookEventRepository::list_failed(harness.storage.as_ref(), channel, 10)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].processed);
    assert!(
        failed[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("missing required fields"))
    );

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_event_type_is_recorded_and_replayable() {
    let harness = TestHarness::new().await.unwrap();
    let channel = harness.channel_id();
    let webhooks = &harness.services.webhooks;

    let err = webhooks
        .process_webhook(channel, "bogus", &json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown event type"));

    let failed = webhooks.list_failed(channel, 10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].event_type, "bogus");
    assert!(webhooks.list_unprocessed(channel, 10).await.unwrap().is_empty());

    // Replay runs the same payload again and records a second row.
    let replayed = webhooks.replay(failed[0].id).await.unwrap_err();
    assert!(replayed.to_string().contains("unknown event type"));
    assert_eq!(webhooks.list_failed(channel, 10).await.unwrap().len(), 2);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replay_of_successful_event_adds_a_message() {
    let harness = TestHarness::new().await.unwrap();
    let channel = harness.channel_id();
    let webhooks = &harness.services.webhooks;

    webhooks
        .process_webhook(channel, "message", &ana_says("again"))
        .await
        .unwrap();
    webhooks.replay(1).await.unwrap();

    let history = harness
        .services
        .outbound
        .history(1, MessageQuery::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|m| m.content == "again"));

    let second = WebhookEventRepository::get_by_id(harness.storage.as_ref(), 2)
        .await
        .unwrap()
        .unwrap();
    assert!(second.processed);
    assert!(second.error.is_none());

    harness.shutdown().await.unwrap();
}

// ---- Services ----

#[tokio::test]
async fn test_read_receipt_without_delivery_is_accepted() {
    let harness = TestHarness::new().await.unwrap();
    let channel = harness.channel_id();
    harness
        .services
        .webhooks
        .process_webhook(channel, "message", &ana_says("hi"))
        .await
        .unwrap();

    harness.services.outbound.mark_read(1).await.unwrap();
    let message = MessageRepository::get_by_id(harness.storage.as_ref(), 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.status, MessageStatus::Read);
    assert!(message.read_at.is_some());

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_agent_reply_and_pagination_clamping() {
    let harness = TestHarness::new().await.unwrap();
    let channel = harness.channel_id();
    harness
        .services
        .webhooks
        .process_webhook(channel, "message", &ana_says("hi"))
        .await
        .unwrap();

    let reply = harness
        .services
        .outbound
        .send_outgoing(
            1,
            parley_chat::OutgoingMessage {
                content: "hello Ana".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(reply.direction, MessageDirection::Outbound);
    assert_eq!(reply.status, MessageStatus::Sent);

    for limit in [0, 500] {
        let listed = harness
            .services
            .conversations
            .list_by_channel(
                channel,
                ConversationQuery {
                    limit,
                    ..ConversationQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    let history = harness
        .services
        .outbound
        .history(
            1,
            MessageQuery {
                limit: 1,
                ..MessageQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, reply.id);

    harness.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failing_sink_does_not_fail_ingestion() {
    let harness = TestHarness::builder()
        .with_failing_sink()
        .build()
        .await
        .unwrap();
    let channel = harness.channel_id();

    harness
        .services
        .webhooks
        .process_webhook(channel, "message", &ana_says("hi"))
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + WAIT;
    while harness.failing_sink.attempts() < 2 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(harness.failing_sink.attempts(), 2);
    assert!(harness.events.events().await.is_empty());

    harness.shutdown().await.unwrap();
}
