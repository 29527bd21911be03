// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel rows. New channels always start in `pending`.

use chrono::Utc;
use parley_core::ParleyError;
use parley_core::pagination::{DEFAULT_LIMIT, normalize_limit, normalize_offset};
use parley_core::types::{Channel, ChannelStatus, NewChannel};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::queries::text_enum;

const COLUMNS: &str = "id, organization_id, platform, name, account_identifier, status, \
     webhook_secret, access_token, config, created_at, updated_at, last_message_at, is_active";

fn row_to_channel(row: &Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        platform: text_enum(row, 2)?,
        name: row.get(3)?,
        account_identifier: row.get(4)?,
        status: text_enum(row, 5)?,
        webhook_secret: row.get(6)?,
        access_token: row.get(7)?,
        config: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        last_message_at: row.get(11)?,
        is_active: row.get(12)?,
    })
}

pub async fn create(db: &Database, channel: &NewChannel) -> Result<Channel, ParleyError> {
    if channel.name.trim().is_empty() {
        return Err(ParleyError::Validation("channel name is required".into()));
    }

    let channel = channel.clone();
    db.connection()
        .call(move |conn| -> Result<Channel, rusqlite::Error> {
            let now = Utc::now();
            let status = ChannelStatus::Pending;
            conn.execute(
                "INSERT INTO channels (organization_id, platform, name, account_identifier, status,
                     webhook_secret, access_token, config, created_at, updated_at, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, 1)",
                params![
                    channel.organization_id,
                    channel.platform.to_string(),
                    channel.name,
                    channel.account_identifier,
                    status.to_string(),
                    channel.webhook_secret,
                    channel.access_token,
                    channel.config,
                    now,
                ],
            )?;
            Ok(Channel {
                id: conn.last_insert_rowid(),
                organization_id: channel.organization_id,
                platform: channel.platform,
                name: channel.name,
                account_identifier: channel.account_identifier,
                status,
                webhook_secret: channel.webhook_secret,
                access_token: channel.access_token,
                config: channel.config,
                created_at: now,
                updated_at: now,
                last_message_at: None,
                is_active: true,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_id(db: &Database, id: i64) -> Result<Option<Channel>, ParleyError> {
    db.connection()
        .call(move |conn| -> Result<Option<Channel>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM channels WHERE id = ?1"),
                params![id],
                row_to_channel,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Active channels of an organization, oldest first.
pub async fn list_by_organization(
    db: &Database,
    organization_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Channel>, ParleyError> {
    let limit = normalize_limit(limit, DEFAULT_LIMIT);
    let offset = normalize_offset(offset);
    db.connection()
        .call(move |conn| -> Result<Vec<Channel>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM channels
                 WHERE organization_id = ?1 AND is_active = 1
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(params![organization_id, limit, offset], row_to_channel)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
