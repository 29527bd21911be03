// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end tests.
//!
//! `TestHarness` wires the chat services to a temp SQLite database and a
//! [`RecordingSink`], and seeds one organization with one channel so
//! webhooks have somewhere to land.

use std::sync::Arc;
use std::time::Duration;

use parley_bus::{Notifier, NotifierHandle};
use parley_chat::{ChatServices, Repositories};
use parley_config::model::StorageConfig;
use parley_core::types::{Channel, NewChannel, NewOrganization, Organization, Platform};
use parley_core::{EventSink, ParleyError, StorageAdapter};
use parley_storage::SqliteStorage;

use crate::sinks::{FailingSink, RecordingSink};

pub struct TestHarnessBuilder {
    slug: String,
    platform: Platform,
    failing_sink: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            slug: "acme".to_string(),
            platform: Platform::Whatsapp,
            failing_sink: false,
        }
    }

    /// Slug of the seeded organization. Defaults to `acme`.
    pub fn with_organization(mut self, slug: &str) -> Self {
        self.slug = slug.to_string();
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Route events to a [`FailingSink`] instead of the recording one.
    pub fn with_failing_sink(mut self) -> Self {
        self.failing_sink = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir = tempfile::TempDir::new().map_err(ParleyError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            ..StorageConfig::default()
        });
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let organization = storage
            .create_organization(&NewOrganization {
                name: self.slug.to_uppercase(),
                slug: self.slug.clone(),
                metadata: None,
            })
            .await?;
        let channel = storage
            .create_channel(&NewChannel {
                organization_id: organization.id,
                platform: self.platform,
                name: "c1".to_string(),
                account_identifier: None,
                webhook_secret: None,
                access_token: None,
                config: None,
            })
            .await?;

        let recorder = Arc::new(RecordingSink::new());
        let failing = Arc::new(FailingSink::new());
        let sink: Arc<dyn EventSink> = if self.failing_sink {
            failing.clone() as Arc<dyn EventSink>
        } else {
            recorder.clone()
        };
        let (notifier, notifier_handle) = Notifier::start(sink, 64, Duration::from_secs(1));

        let services = ChatServices::new(Repositories::from_store(storage.clone()), notifier);

        Ok(TestHarness {
            storage,
            services,
            events: recorder,
            failing_sink: failing,
            organization,
            channel,
            notifier_handle,
            _temp_dir: temp_dir,
        })
    }
}

/// Services over real SQLite, with captured notifications.
pub struct TestHarness {
    /// Storage backend (temp DB, removed on drop).
    pub storage: Arc<SqliteStorage>,
    pub services: ChatServices,
    /// Receives every notification unless the failing sink was selected.
    pub events: Arc<RecordingSink>,
    pub failing_sink: Arc<FailingSink>,
    pub organization: Organization,
    pub channel: Channel,
    notifier_handle: NotifierHandle,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Default harness: organization `acme` with a WhatsApp channel.
    pub async fn new() -> Result<Self, ParleyError> {
        Self::builder().build().await
    }

    pub fn channel_id(&self) -> i64 {
        self.channel.id
    }

    /// Flush pending notifications and checkpoint the database.
    pub async fn shutdown(self) -> Result<(), ParleyError> {
        self.notifier_handle.shutdown(Duration::from_secs(2)).await;
        self.storage.close().await
    }
}
