// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook pipeline behaviour against the in-memory repositories.

use std::sync::Arc;
use std::time::Duration;

use parley_bus::{Notifier, NotifierHandle, catalog};
use parley_chat::{ChatServices, Repositories};
use parley_core::types::{ConversationStatus, MessageDirection, MessageStatus, SenderType};
use parley_core::{EventSink, ParleyError};
use parley_test_utils::{FailPoint, FailingSink, MemoryStore, RecordingSink};
use serde_json::json;

const CHANNEL: i64 = 1;
const WAIT: Duration = Duration::from_secs(2);

struct Fixture {
    store: Arc<MemoryStore>,
    sink: Arc<RecordingSink>,
    services: ChatServices,
    _handle: NotifierHandle,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::new());
    let (notifier, handle) = Notifier::start(sink.clone(), 64, Duration::from_secs(1));
    let services = ChatServices::new(Repositories::from_store(store.clone()), notifier);
    Fixture {
        store,
        sink,
        services,
        _handle: handle,
    }
}

fn ana_says(content: &str) -> serde_json::Value {
    json!({
        "event_type": "message",
        "user_id": "wa-42",
        "user_name": "Ana",
        "content": content,
        "message_type": "text",
    })
}

#[tokio::test]
async fn message_event_threads_and_notifies() {
    let f = fixture();
    f.services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap();

    let users = f.store.users().await;
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].platform_user_id, "wa-42");
    assert_eq!(users[0].display_name.as_deref(), Some("Ana"));

    let conversations = f.store.conversations().await;
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].status, ConversationStatus::Open);
    assert!(conversations[0].first_message_at.is_some());

    let messages = f.store.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[0].direction, MessageDirection::Inbound);
    assert_eq!(messages[0].sender_type, SenderType::External);
    assert_eq!(messages[0].sender_id, Some(users[0].id));
    assert_eq!(messages[0].status, MessageStatus::Received);

    let events = f.store.webhook_events().await;
    assert_eq!(events.len(), 1);
    assert!(events[0].processed);
    assert!(events[0].processed_at.is_some());
    assert!(events[0].error.is_none());

    let emitted = f.sink.wait_for_events(2, WAIT).await;
    let types: Vec<&str> = emitted.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, [catalog::CONVERSATION_CREATED, catalog::MESSAGE_NEW]);

    let new = &emitted[1].payload;
    assert_eq!(new["message_id"], json!(messages[0].id));
    assert_eq!(new["conversation_id"], json!(conversations[0].id));
    assert_eq!(new["channel_id"], json!(CHANNEL));
    assert_eq!(new["external_user_id"], json!(users[0].id));
    assert_eq!(new["content"], "hi");
    assert_eq!(new["message_type"], "text");
    assert_eq!(new["direction"], "inbound");
    assert!(new.contains_key("timestamp"));
}

#[tokio::test]
async fn follow_up_reuses_conversation_until_closed() {
    let f = fixture();
    let webhooks = &f.services.webhooks;
    webhooks
        .process_webhook(CHANNEL, "message", &ana_says("one"))
        .await
        .unwrap();
    webhooks
        .process_webhook(CHANNEL, "message", &ana_says("two"))
        .await
        .unwrap();

    let conversations = f.store.conversations().await;
    assert_eq!(conversations.len(), 1);
    assert_eq!(f.store.users().await.len(), 1);
    assert_eq!(f.store.messages().await.len(), 2);

    f.services
        .conversations
        .update_status(conversations[0].id, ConversationStatus::Closed)
        .await
        .unwrap();
    webhooks
        .process_webhook(CHANNEL, "message", &ana_says("three"))
        .await
        .unwrap();

    let conversations = f.store.conversations().await;
    assert_eq!(conversations.len(), 2);
    let latest = f.store.messages().await.pop().unwrap();
    assert_eq!(latest.conversation_id, conversations[1].id);
}

#[tokio::test]
async fn missing_fields_fail_but_are_recorded() {
    let f = fixture();
    let err = f
        .services
        .webhooks
        .process_webhook(CHANNEL, "message", &json!({"user_id": "wa-1"}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing required fields"));

    let events = f.store.webhook_events().await;
    assert_eq!(events.len(), 1);
    assert!(events[0].processed);
    assert!(!events[0].error.as_deref().unwrap_or_default().is_empty());
    assert!(f.store.users().await.is_empty());
}

#[tokio::test]
async fn unknown_event_type_is_recorded_as_failed() {
    let f = fixture();
    let err = f
        .services
        .webhooks
        .process_webhook(CHANNEL, "bogus", &json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown event type"));

    let events = f.store.webhook_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "bogus");
    assert!(events[0].processed);
    assert!(events[0].error.as_deref().unwrap().contains("unknown event type"));
}

#[tokio::test]
async fn non_object_message_payload_is_invalid() {
    let f = fixture();
    let err = f
        .services
        .webhooks
        .process_webhook(CHANNEL, "message", &json!(["not", "an", "object"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::InvalidPayload(_)));
    assert_eq!(f.store.webhook_events().await.len(), 1);
}

#[tokio::test]
async fn status_updates_transition_messages() {
    let f = fixture();
    let webhooks = &f.services.webhooks;
    webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap();
    let id = f.store.messages().await[0].id;

    webhooks
        .process_webhook(
            CHANNEL,
            "status_update",
            &json!({"message_id": id, "status": "delivered"}),
        )
        .await
        .unwrap();
    let message = f.store.messages().await.remove(0);
    assert_eq!(message.status, MessageStatus::Delivered);
    assert!(message.delivered_at.is_some());

    let delivered = f.sink.wait_for_events(3, WAIT).await;
    let last = delivered.last().unwrap();
    assert_eq!(last.event_type, catalog::MESSAGE_DELIVERED);
    assert_eq!(last.payload["message_id"], json!(id));
    assert_eq!(last.payload["status"], "delivered");
}

#[tokio::test]
async fn unhandled_receipt_status_is_a_no_op() {
    let f = fixture();
    f.services
        .webhooks
        .process_webhook(
            CHANNEL,
            "status_update",
            &json!({"message_id": 5, "status": "typing"}),
        )
        .await
        .unwrap();

    let events = f.store.webhook_events().await;
    assert!(events[0].processed);
    assert!(events[0].error.is_none());
}

#[tokio::test]
async fn receipt_for_unknown_message_is_not_found() {
    let f = fixture();
    let err = f
        .services
        .webhooks
        .process_webhook(
            CHANNEL,
            "status_update",
            &json!({"message_id": 404, "status": "read"}),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(f.store.webhook_events().await[0].error.is_some());
}

#[tokio::test]
async fn audit_insert_failure_is_fatal_and_leaves_nothing() {
    let f = fixture();
    f.store.fail(FailPoint::CreateWebhookEvent).await;

    let err = f
        .services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::WebhookPersistence(_)));
    assert!(f.store.webhook_events().await.is_empty());
    assert!(f.store.users().await.is_empty());
}

struct Unserializable;

impl serde::Serialize for Unserializable {
    fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("cannot encode"))
    }
}

#[tokio::test]
async fn unserializable_payload_is_rejected_before_recording() {
    let f = fixture();
    let err = f
        .services
        .webhooks
        .process_webhook(CHANNEL, "message", &Unserializable)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Serialization(_)));
    assert!(f.store.webhook_events().await.is_empty());
}

#[tokio::test]
async fn resolution_failures_carry_step_context() {
    let f = fixture();
    f.store.fail(FailPoint::FindOrCreateUser).await;
    let err = f
        .services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to find/create user"));
    f.store.recover(FailPoint::FindOrCreateUser).await;

    f.store.fail(FailPoint::GetOrCreateConversation).await;
    let err = f
        .services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to get/create conversation"));
    f.store.recover(FailPoint::GetOrCreateConversation).await;

    f.store.fail(FailPoint::CreateMessage).await;
    let err = f
        .services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("failed to create message"));

    // Earlier steps are not rolled back.
    assert_eq!(f.store.users().await.len(), 1);
    assert_eq!(f.store.conversations().await.len(), 1);
    assert!(f.store.messages().await.is_empty());

    let recorded = f.store.webhook_events().await;
    assert_eq!(recorded.len(), 3);
    assert!(recorded.iter().all(|e| e.processed && e.error.is_some()));
}

#[tokio::test]
async fn recency_failures_do_not_fail_ingestion() {
    let f = fixture();
    f.store.fail(FailPoint::TouchLastMessage).await;
    f.store.fail(FailPoint::TouchLastSeen).await;

    f.services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap();
    assert_eq!(f.store.messages().await.len(), 1);
    assert!(f.store.conversations().await[0].last_message_at.is_none());
    assert!(f.store.webhook_events().await[0].error.is_none());
}

#[tokio::test]
async fn finalize_failure_leaves_row_unprocessed() {
    let f = fixture();
    f.store.fail(FailPoint::FinalizeWebhookEvent).await;

    f.services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap();

    let pending = f.services.webhooks.list_unprocessed(CHANNEL, 0).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].processed);
}

#[tokio::test]
async fn replay_reprocesses_into_a_new_row() {
    let f = fixture();
    f.store.fail(FailPoint::CreateMessage).await;
    f.services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("lost"))
        .await
        .unwrap_err();
    f.store.recover(FailPoint::CreateMessage).await;

    let failed = f.services.webhooks.list_failed(CHANNEL, 10).await.unwrap();
    assert_eq!(failed.len(), 1);

    f.services.webhooks.replay(failed[0].id).await.unwrap();

    let rows = f.store.webhook_events().await;
    assert_eq!(rows.len(), 2);
    assert!(rows[0].error.is_some(), "original row is untouched");
    assert!(rows[1].processed && rows[1].error.is_none());
    assert_eq!(rows[0].payload, rows[1].payload);
    assert_eq!(f.store.messages().await[0].content, "lost");
}

#[tokio::test]
async fn replay_of_unknown_row_is_not_found() {
    let f = fixture();
    let err = f.services.webhooks.replay(77).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn emission_failures_are_swallowed() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(FailingSink::new());
    let (notifier, handle) = Notifier::start(
        sink.clone() as Arc<dyn EventSink>,
        8,
        Duration::from_millis(100),
    );
    let services = ChatServices::new(Repositories::from_store(store.clone()), notifier);

    services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("hi"))
        .await
        .unwrap();
    handle.shutdown(WAIT).await;

    assert_eq!(sink.attempts(), 2);
    assert!(store.webhook_events().await[0].error.is_none());
}

#[tokio::test]
async fn disabled_notifier_still_processes() {
    let store = Arc::new(MemoryStore::new());
    let services = ChatServices::new(Repositories::from_store(store.clone()), Notifier::disabled());
    services
        .webhooks
        .process_webhook(CHANNEL, "message", &ana_says("quiet"))
        .await
        .unwrap();
    assert_eq!(store.messages().await.len(), 1);
}
