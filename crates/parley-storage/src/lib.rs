// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for parley.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and the repository implementations
//! the messaging services depend on.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;

#[cfg(test)]
pub(crate) mod test_support {
    use parley_core::types::{NewChannel, NewConversation, NewExternalUser, NewOrganization, Platform};

    use crate::database::Database;
    use crate::queries::{channels, conversations, external_users, organizations};

    /// In-memory database with one organization and one channel.
    pub async fn seed_channel() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        organizations::create(
            &db,
            &NewOrganization {
                name: "Acme".into(),
                slug: "acme".into(),
                metadata: None,
            },
        )
        .await
        .unwrap();
        let channel_id = add_channel(&db, "c1").await;
        (db, channel_id)
    }

    pub async fn add_channel(db: &Database, name: &str) -> i64 {
        let org = organizations::get_by_slug(db, "acme").await.unwrap().unwrap();
        channels::create(
            db,
            &NewChannel {
                organization_id: org.id,
                platform: Platform::Whatsapp,
                name: name.into(),
                account_identifier: None,
                webhook_secret: None,
                access_token: None,
                config: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    pub async fn seed_user(db: &Database, channel_id: i64, platform_user_id: &str) -> i64 {
        external_users::create(
            db,
            &NewExternalUser {
                channel_id,
                platform_user_id: platform_user_id.into(),
                ..NewExternalUser::default()
            },
        )
        .await
        .unwrap()
        .id
    }

    pub async fn seed_conversation(db: &Database, channel_id: i64) -> i64 {
        let user_id = seed_user(db, channel_id, "wa-42").await;
        conversations::create(
            db,
            &NewConversation {
                channel_id,
                external_user_id: user_id,
                ..NewConversation::default()
            },
        )
        .await
        .unwrap()
        .id
    }
}
