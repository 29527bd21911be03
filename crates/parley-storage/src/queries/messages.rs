// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message rows. Content is immutable; only status and its timestamps change.

use chrono::Utc;
use parley_core::ParleyError;
use parley_core::pagination::{MESSAGE_DEFAULT_LIMIT, normalize_limit, normalize_offset};
use parley_core::types::{Message, MessageQuery, MessageStatus, NewMessage};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::queries::text_enum;

const COLUMNS: &str = "id, conversation_id, platform_message_id, sender_type, sender_id, content, \
     message_type, media_url, direction, status, created_at, delivered_at, read_at, metadata";

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        platform_message_id: row.get(2)?,
        sender_type: text_enum(row, 3)?,
        sender_id: row.get(4)?,
        content: row.get(5)?,
        message_type: text_enum(row, 6)?,
        media_url: row.get(7)?,
        direction: text_enum(row, 8)?,
        status: text_enum(row, 9)?,
        created_at: row.get(10)?,
        delivered_at: row.get(11)?,
        read_at: row.get(12)?,
        metadata: row.get(13)?,
    })
}

pub async fn create(db: &Database, message: &NewMessage) -> Result<Message, ParleyError> {
    let msg = message.clone();
    db.connection()
        .call(move |conn| -> Result<Message, rusqlite::Error> {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO messages (conversation_id, platform_message_id, sender_type, sender_id,
                     content, message_type, media_url, direction, status, created_at, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    msg.conversation_id,
                    msg.platform_message_id,
                    msg.sender_type.to_string(),
                    msg.sender_id,
                    msg.content,
                    msg.message_type.to_string(),
                    msg.media_url,
                    msg.direction.to_string(),
                    msg.status.to_string(),
                    now,
                    msg.metadata,
                ],
            )?;
            Ok(Message {
                id: conn.last_insert_rowid(),
                conversation_id: msg.conversation_id,
                platform_message_id: msg.platform_message_id,
                sender_type: msg.sender_type,
                sender_id: msg.sender_id,
                content: msg.content,
                message_type: msg.message_type,
                media_url: msg.media_url,
                direction: msg.direction,
                status: msg.status,
                created_at: now,
                delivered_at: None,
                read_at: None,
                metadata: msg.metadata,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_id(db: &Database, id: i64) -> Result<Option<Message>, ParleyError> {
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// History page, newest first. `before_id` restricts to strictly older ids.
pub async fn list_by_conversation(
    db: &Database,
    conversation_id: i64,
    query: &MessageQuery,
) -> Result<Vec<Message>, ParleyError> {
    let limit = normalize_limit(query.limit, MESSAGE_DEFAULT_LIMIT);
    let offset = normalize_offset(query.offset);
    let before_id = query.before_id;
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE conversation_id = ?1 AND (?2 IS NULL OR id < ?2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(
                params![conversation_id, before_id, limit, offset],
                row_to_message,
            )?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set the status, stamping `delivered_at` or `read_at` for those states.
///
/// No ordering between states is enforced.
pub async fn update_status(
    db: &Database,
    id: i64,
    status: MessageStatus,
) -> Result<(), ParleyError> {
    let affected = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let now = Utc::now();
            let label = status.to_string();
            match status {
                MessageStatus::Delivered => conn.execute(
                    "UPDATE messages SET status = ?1, delivered_at = ?2 WHERE id = ?3",
                    params![label, now, id],
                ),
                MessageStatus::Read => conn.execute(
                    "UPDATE messages SET status = ?1, read_at = ?2 WHERE id = ?3",
                    params![label, now, id],
                ),
                _ => conn.execute(
                    "UPDATE messages SET status = ?1 WHERE id = ?2",
                    params![label, id],
                ),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if affected == 0 {
        return Err(ParleyError::message_not_found(id));
    }
    Ok(())
}
