// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External user rows, keyed by `(channel_id, platform_user_id)`.

use chrono::{DateTime, Utc};
use parley_core::ParleyError;
use parley_core::types::{ExternalUser, ExternalUserUpdate, NewExternalUser};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params, params_from_iter};

use crate::database::Database;

const COLUMNS: &str = "id, channel_id, platform_user_id, platform_username, display_name, \
     phone_number, email, avatar_url, metadata, first_seen_at, last_seen_at, is_blocked";

fn not_found(id: i64) -> ParleyError {
    ParleyError::NotFound {
        entity: "external user",
        id,
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<ExternalUser> {
    Ok(ExternalUser {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        platform_user_id: row.get(2)?,
        platform_username: row.get(3)?,
        display_name: row.get(4)?,
        phone_number: row.get(5)?,
        email: row.get(6)?,
        avatar_url: row.get(7)?,
        metadata: row.get(8)?,
        first_seen_at: row.get(9)?,
        last_seen_at: row.get(10)?,
        is_blocked: row.get(11)?,
    })
}

fn select_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<ExternalUser>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM external_users WHERE id = ?1"),
        params![id],
        row_to_user,
    )
    .optional()
}

fn select_by_identity(
    conn: &Connection,
    channel_id: i64,
    platform_user_id: &str,
) -> rusqlite::Result<Option<ExternalUser>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM external_users WHERE channel_id = ?1 AND platform_user_id = ?2"
        ),
        params![channel_id, platform_user_id],
        row_to_user,
    )
    .optional()
}

fn insert(
    conn: &Connection,
    user: NewExternalUser,
    now: DateTime<Utc>,
) -> rusqlite::Result<ExternalUser> {
    conn.execute(
        "INSERT INTO external_users (channel_id, platform_user_id, platform_username, display_name,
             phone_number, email, avatar_url, metadata, first_seen_at, last_seen_at, is_blocked)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, 0)",
        params![
            user.channel_id,
            user.platform_user_id,
            user.platform_username,
            user.display_name,
            user.phone_number,
            user.email,
            user.avatar_url,
            user.metadata,
            now,
        ],
    )?;
    Ok(ExternalUser {
        id: conn.last_insert_rowid(),
        channel_id: user.channel_id,
        platform_user_id: user.platform_user_id,
        platform_username: user.platform_username,
        display_name: user.display_name,
        phone_number: user.phone_number,
        email: user.email,
        avatar_url: user.avatar_url,
        metadata: user.metadata,
        first_seen_at: now,
        last_seen_at: now,
        is_blocked: false,
    })
}

fn touch(conn: &Connection, id: i64, now: DateTime<Utc>) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE external_users SET last_seen_at = ?1 WHERE id = ?2",
        params![now, id],
    )
}

pub async fn create(db: &Database, user: &NewExternalUser) -> Result<ExternalUser, ParleyError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| insert(conn, user, Utc::now()))
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_id(db: &Database, id: i64) -> Result<Option<ExternalUser>, ParleyError> {
    db.connection()
        .call(move |conn| select_by_id(conn, id))
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_channel_and_platform_id(
    db: &Database,
    channel_id: i64,
    platform_user_id: &str,
) -> Result<Option<ExternalUser>, ParleyError> {
    let platform_user_id = platform_user_id.to_string();
    db.connection()
        .call(move |conn| select_by_identity(conn, channel_id, &platform_user_id))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Lookup and insert run in one connection closure, so two first-contact
/// webhooks for the same identity cannot both insert.
pub async fn find_or_create(
    db: &Database,
    user: &NewExternalUser,
) -> Result<ExternalUser, ParleyError> {
    let user = user.clone();
    db.connection()
        .call(move |conn| -> Result<ExternalUser, rusqlite::Error> {
            let now = Utc::now();
            match select_by_identity(conn, user.channel_id, &user.platform_user_id)? {
                Some(mut existing) => {
                    touch(conn, existing.id, now)?;
                    existing.last_seen_at = now;
                    Ok(existing)
                }
                None => insert(conn, user, now),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Apply the non-`None` fields of `update`.
pub async fn update(
    db: &Database,
    id: i64,
    update: &ExternalUserUpdate,
) -> Result<ExternalUser, ParleyError> {
    let mut sets: Vec<&'static str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql + Send>> = Vec::new();

    let text_fields = [
        ("platform_username = ?", &update.platform_username),
        ("display_name = ?", &update.display_name),
        ("phone_number = ?", &update.phone_number),
        ("email = ?", &update.email),
        ("avatar_url = ?", &update.avatar_url),
    ];
    for (clause, value) in text_fields {
        if let Some(v) = value {
            sets.push(clause);
            values.push(Box::new(v.clone()));
        }
    }
    if let Some(metadata) = &update.metadata {
        sets.push("metadata = ?");
        values.push(Box::new(metadata.clone()));
    }
    if let Some(blocked) = update.is_blocked {
        sets.push("is_blocked = ?");
        values.push(Box::new(blocked));
    }

    let found = db
        .connection()
        .call(move |conn| -> Result<Option<ExternalUser>, rusqlite::Error> {
            if !sets.is_empty() {
                values.push(Box::new(id));
                let sql = format!("UPDATE external_users SET {} WHERE id = ?", sets.join(", "));
                conn.execute(&sql, params_from_iter(values.iter()))?;
            }
            select_by_id(conn, id)
        })
        .await
        .map_err(crate::database::map_tr_err)?;

    found.ok_or_else(|| not_found(id))
}

pub async fn touch_last_seen(db: &Database, id: i64) -> Result<(), ParleyError> {
    let affected = db
        .connection()
        .call(move |conn| touch(conn, id, Utc::now()))
        .await
        .map_err(crate::database::map_tr_err)?;
    if affected == 0 {
        return Err(not_found(id));
    }
    Ok(())
}
