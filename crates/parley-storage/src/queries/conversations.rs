// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation rows and the open-conversation threading lookup.

use chrono::{DateTime, Utc};
use parley_core::ParleyError;
use parley_core::pagination::{DEFAULT_LIMIT, normalize_limit, normalize_offset};
use parley_core::types::{Conversation, ConversationQuery, ConversationUpdate, NewConversation};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params, params_from_iter};

use crate::database::Database;
use crate::queries::text_enum;

const COLUMNS: &str = "id, channel_id, external_user_id, assignee_id, status, priority, subject, \
     metadata, first_message_at, last_message_at, resolved_at, created_at, updated_at";

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        external_user_id: row.get(2)?,
        assignee_id: row.get(3)?,
        status: text_enum(row, 4)?,
        priority: text_enum(row, 5)?,
        subject: row.get(6)?,
        metadata: row.get(7)?,
        first_message_at: row.get(8)?,
        last_message_at: row.get(9)?,
        resolved_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn select_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        row_to_conversation,
    )
    .optional()
}

fn insert(
    conn: &Connection,
    conv: NewConversation,
    now: DateTime<Utc>,
) -> rusqlite::Result<Conversation> {
    let resolved_at = conv.status.stamps_resolution().then_some(now);
    conn.execute(
        "INSERT INTO conversations (channel_id, external_user_id, assignee_id, status, priority,
             subject, metadata, resolved_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            conv.channel_id,
            conv.external_user_id,
            conv.assignee_id,
            conv.status.to_string(),
            conv.priority.to_string(),
            conv.subject,
            conv.metadata,
            resolved_at,
            now,
        ],
    )?;
    Ok(Conversation {
        id: conn.last_insert_rowid(),
        channel_id: conv.channel_id,
        external_user_id: conv.external_user_id,
        assignee_id: conv.assignee_id,
        status: conv.status,
        priority: conv.priority,
        subject: conv.subject,
        metadata: conv.metadata,
        first_message_at: None,
        last_message_at: None,
        resolved_at,
        created_at: now,
        updated_at: now,
    })
}

pub async fn create(db: &Database, conv: &NewConversation) -> Result<Conversation, ParleyError> {
    let conv = conv.clone();
    db.connection()
        .call(move |conn| insert(conn, conv, Utc::now()))
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_id(db: &Database, id: i64) -> Result<Option<Conversation>, ParleyError> {
    db.connection()
        .call(move |conn| select_by_id(conn, id))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Reuse the newest open/pending conversation for the pair or open a new one.
///
/// Runs as one connection closure; concurrent first-contact webhooks for the
/// same pair therefore see each other's insert.
pub async fn get_or_create_open_for_user(
    db: &Database,
    channel_id: i64,
    external_user_id: i64,
) -> Result<(Conversation, bool), ParleyError> {
    db.connection()
        .call(move |conn| -> Result<(Conversation, bool), rusqlite::Error> {
            let existing = conn
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM conversations
                         WHERE channel_id = ?1 AND external_user_id = ?2
                           AND status IN ('open', 'pending')
                         ORDER BY created_at DESC, id DESC
                         LIMIT 1"
                    ),
                    params![channel_id, external_user_id],
                    row_to_conversation,
                )
                .optional()?;
            match existing {
                Some(conv) => Ok((conv, false)),
                None => {
                    let fresh = NewConversation {
                        channel_id,
                        external_user_id,
                        ..NewConversation::default()
                    };
                    Ok((insert(conn, fresh, Utc::now())?, true))
                }
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recently updated first.
pub async fn list(
    db: &Database,
    channel_id: i64,
    query: &ConversationQuery,
) -> Result<Vec<Conversation>, ParleyError> {
    let limit = normalize_limit(query.limit, DEFAULT_LIMIT);
    let offset = normalize_offset(query.offset);
    let status = query.status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Conversation>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conversations
                 WHERE channel_id = ?1 AND (?2 IS NULL OR status = ?2)
                 ORDER BY updated_at DESC, id DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(
                params![channel_id, status, limit, offset],
                row_to_conversation,
            )?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply a partial update and return the stored row.
///
/// `updated_at` is always bumped. A resolved/closed status stamps `resolved_at`.
pub async fn update(
    db: &Database,
    id: i64,
    update: &ConversationUpdate,
) -> Result<Conversation, ParleyError> {
    let now = Utc::now();
    let mut sets: Vec<&'static str> = vec!["updated_at = ?"];
    let mut values: Vec<Box<dyn ToSql + Send>> = vec![Box::new(now)];

    if let Some(assignee) = &update.assignee_id {
        sets.push("assignee_id = ?");
        values.push(Box::new(assignee.clone()));
    }
    if let Some(status) = update.status {
        sets.push("status = ?");
        values.push(Box::new(status.to_string()));
        if status.stamps_resolution() {
            sets.push("resolved_at = ?");
            values.push(Box::new(now));
        }
    }
    if let Some(priority) = update.priority {
        sets.push("priority = ?");
        values.push(Box::new(priority.to_string()));
    }
    if let Some(subject) = &update.subject {
        sets.push("subject = ?");
        values.push(Box::new(subject.clone()));
    }
    if let Some(metadata) = &update.metadata {
        sets.push("metadata = ?");
        values.push(Box::new(metadata.clone()));
    }
    values.push(Box::new(id));

    let found = db
        .connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> {
            let sql = format!("UPDATE conversations SET {} WHERE id = ?", sets.join(", "));
            let affected = conn.execute(&sql, params_from_iter(values.iter()))?;
            if affected == 0 {
                return Ok(None);
            }
            select_by_id(conn, id)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    found.ok_or_else(|| ParleyError::conversation_not_found(id))
}

/// Recency bump after a message lands.
pub async fn touch_last_message(db: &Database, id: i64) -> Result<(), ParleyError> {
    let affected = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE conversations
                 SET last_message_at = ?1,
                     updated_at = ?1,
                     first_message_at = COALESCE(first_message_at, ?1)
                 WHERE id = ?2",
                params![Utc::now(), id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if affected == 0 {
        return Err(ParleyError::conversation_not_found(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_channel, seed_user};
    use parley_core::types::{ConversationPriority, ConversationStatus};

    #[tokio::test]
    async fn get_or_create_reuses_open_conversation() {
        let (db, channel_id) = seed_channel().await;
        let user_id = seed_user(&db, channel_id, "wa-42").await;

        let (first, created) = get_or_create_open_for_user(&db, channel_id, user_id)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(first.status, ConversationStatus::Open);
        assert_eq!(first.priority, ConversationPriority::Normal);

        let (second, created) = get_or_create_open_for_user(&db, channel_id, user_id)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn pending_conversations_are_reused_but_closed_ones_are_not() {
        let (db, channel_id) = seed_channel().await;
        let user_id = seed_user(&db, channel_id, "wa-42").await;
        let (conv, _) = get_or_create_open_for_user(&db, channel_id, user_id)
            .await
            .unwrap();

        update(
            &db,
            conv.id,
            &ConversationUpdate {
                status: Some(ConversationStatus::Pending),
                ..ConversationUpdate::default()
            },
        )
        .await
        .unwrap();
        let (again, created) = get_or_create_open_for_user(&db, channel_id, user_id)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, conv.id);

        let closed = update(
            &db,
            conv.id,
            &ConversationUpdate {
                status: Some(ConversationStatus::Closed),
                ..ConversationUpdate::default()
            },
        )
        .await
        .unwrap();
        assert!(closed.resolved_at.is_some());

        let (fresh, created) = get_or_create_open_for_user(&db, channel_id, user_id)
            .await
            .unwrap();
        assert!(created);
        assert_ne!(fresh.id, conv.id);
    }

    #[tokio::test]
    async fn newest_active_conversation_wins_when_several_exist() {
        let (db, channel_id) = seed_channel().await;
        let user_id = seed_user(&db, channel_id, "wa-42").await;
        let base = NewConversation {
            channel_id,
            external_user_id: user_id,
            ..NewConversation::default()
        };
        create(&db, &base).await.unwrap();
        let newer = create(
            &db,
            &NewConversation {
                status: ConversationStatus::Pending,
                ..base.clone()
            },
        )
        .await
        .unwrap();

        let (picked, created) = get_or_create_open_for_user(&db, channel_id, user_id)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(picked.id, newer.id);
    }

    #[tokio::test]
    async fn touch_last_message_sets_first_message_once() {
        let (db, channel_id) = seed_channel().await;
        let user_id = seed_user(&db, channel_id, "wa-42").await;
        let (conv, _) = get_or_create_open_for_user(&db, channel_id, user_id)
            .await
            .unwrap();

        touch_last_message(&db, conv.id).await.unwrap();
        let after_first = get_by_id(&db, conv.id).await.unwrap().unwrap();
        let first_at = after_first.first_message_at.unwrap();

        touch_last_message(&db, conv.id).await.unwrap();
        let after_second = get_by_id(&db, conv.id).await.unwrap().unwrap();
        assert_eq!(after_second.first_message_at, Some(first_at));
        assert!(after_second.last_message_at.unwrap() >= first_at);

        assert!(touch_last_message(&db, 999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn list_filters_by_status_and_normalizes_paging() {
        let (db, channel_id) = seed_channel().await;
        for i in 0..3 {
            let user_id = seed_user(&db, channel_id, &format!("u{i}")).await;
            get_or_create_open_for_user(&db, channel_id, user_id)
                .await
                .unwrap();
        }
        let all = list(
            &db,
            channel_id,
            &ConversationQuery {
                limit: 0,
                ..ConversationQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(all.len(), 3);

        update(
            &db,
            all[0].id,
            &ConversationUpdate {
                status: Some(ConversationStatus::Resolved),
                ..ConversationUpdate::default()
            },
        )
        .await
        .unwrap();
        let open = list(
            &db,
            channel_id,
            &ConversationQuery {
                status: Some(ConversationStatus::Open),
                limit: 500,
                offset: -4,
            },
        )
        .await
        .unwrap();
        assert_eq!(open.len(), 2);
    }

    #[tokio::test]
    async fn update_missing_conversation_is_not_found() {
        let (db, _) = seed_channel().await;
        let err = update(&db, 31337, &ConversationUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("conversation not found"));
    }
}
