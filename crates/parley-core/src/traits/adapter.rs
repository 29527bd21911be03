// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait for long-lived backends (storage, event bus clients).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, health, and shutdown for a backend the server holds open.
///
/// The gateway's `/health` route reports whatever `health_check` returns.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Human-readable name of this adapter instance.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    async fn health_check(&self) -> Result<HealthStatus, ParleyError>;

    /// Release held resources. Called once during graceful shutdown.
    async fn shutdown(&self) -> Result<(), ParleyError>;
}
