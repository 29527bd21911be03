// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter lifecycle.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle for persistence backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Open the backend and apply pending migrations.
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Flush pending writes and release the connection.
    async fn close(&self) -> Result<(), ParleyError>;
}
