// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All statements are serialized through tokio-rusqlite's single background
//! thread, so each closure passed to [`Connection::call`] observes no
//! interleaved writes from other callers. Do NOT open a second connection for
//! writes.

use std::path::Path;
use std::time::Duration;

use parley_config::model::StorageConfig;
use parley_core::ParleyError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into `ParleyError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> ParleyError {
    ParleyError::storage(e)
}

/// Handle to an open, migrated SQLite database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database described by `config` and apply
    /// pending migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, ParleyError> {
        let path = config.database_path.clone();
        if path != ":memory:" {
            if let Some(parent) = Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(ParleyError::storage)?;
                }
            }
        }

        let conn = Connection::open(&path).await.map_err(ParleyError::storage)?;

        let wal_mode = config.wal_mode;
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        conn.call(move |conn| -> Result<Result<(), ParleyError>, rusqlite::Error> {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            if wal_mode {
                conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
            }
            Ok(migrations::run_migrations(conn))
        })
        .await
        .map_err(map_tr_err)??;

        debug!(path = %path, wal_mode, "database opened and migrated");
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, ParleyError> {
        Self::open(&StorageConfig {
            database_path: ":memory:".to_string(),
            wal_mode: false,
            ..StorageConfig::default()
        })
        .await
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), ParleyError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}
