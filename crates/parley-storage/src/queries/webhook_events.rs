// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event audit rows.
//!
//! Rows are inserted unprocessed before any side effect and finalized exactly
//! once. They are never deleted.

use chrono::Utc;
use parley_core::ParleyError;
use parley_core::pagination::{DEFAULT_LIMIT, normalize_limit};
use parley_core::types::{NewWebhookEvent, WebhookEvent};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;

const COLUMNS: &str = "id, channel_id, event_type, payload, processed, created_at, processed_at, error";

fn not_found(id: i64) -> ParleyError {
    ParleyError::NotFound {
        entity: "webhook event",
        id,
    }
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<WebhookEvent> {
    Ok(WebhookEvent {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        event_type: row.get(2)?,
        payload: row.get(3)?,
        processed: row.get(4)?,
        created_at: row.get(5)?,
        processed_at: row.get(6)?,
        error: row.get(7)?,
    })
}

pub async fn create(db: &Database, event: &NewWebhookEvent) -> Result<WebhookEvent, ParleyError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| -> Result<WebhookEvent, rusqlite::Error> {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO webhook_events (channel_id, event_type, payload, processed, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![event.channel_id, event.event_type, event.payload, now],
            )?;
            Ok(WebhookEvent {
                id: conn.last_insert_rowid(),
                channel_id: event.channel_id,
                event_type: event.event_type,
                payload: event.payload,
                processed: false,
                created_at: now,
                processed_at: None,
                error: None,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_id(db: &Database, id: i64) -> Result<Option<WebhookEvent>, ParleyError> {
    db.connection()
        .call(move |conn| -> Result<Option<WebhookEvent>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM webhook_events WHERE id = ?1"),
                params![id],
                row_to_event,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Events never finalized (for example after a crash mid-processing), oldest first.
pub async fn list_unprocessed(
    db: &Database,
    channel_id: i64,
    limit: i64,
) -> Result<Vec<WebhookEvent>, ParleyError> {
    let limit = normalize_limit(limit, DEFAULT_LIMIT);
    db.connection()
        .call(move |conn| -> Result<Vec<WebhookEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM webhook_events
                 WHERE channel_id = ?1 AND processed = 0
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![channel_id, limit], row_to_event)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Events finalized with an error, most recent first.
pub async fn list_failed(
    db: &Database,
    channel_id: i64,
    limit: i64,
) -> Result<Vec<WebhookEvent>, ParleyError> {
    let limit = normalize_limit(limit, DEFAULT_LIMIT);
    db.connection()
        .call(move |conn| -> Result<Vec<WebhookEvent>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM webhook_events
                 WHERE channel_id = ?1 AND processed = 1 AND error IS NOT NULL
                 ORDER BY processed_at DESC, id DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![channel_id, limit], row_to_event)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

async fn finalize(db: &Database, id: i64, error: Option<String>) -> Result<(), ParleyError> {
    let affected = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE webhook_events SET processed = 1, processed_at = ?1, error = ?2 WHERE id = ?3",
                params![Utc::now(), error, id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if affected == 0 {
        return Err(not_found(id));
    }
    Ok(())
}

pub async fn mark_processed(db: &Database, id: i64) -> Result<(), ParleyError> {
    finalize(db, id, None).await
}

pub async fn mark_failed(db: &Database, id: i64, error: &str) -> Result<(), ParleyError> {
    finalize(db, id, Some(error.to_string())).await
}
