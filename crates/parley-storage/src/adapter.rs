// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage adapter and repository traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use parley_config::model::StorageConfig;
use parley_core::traits::{
    ConversationRepository, ExternalUserRepository, MessageRepository, WebhookEventRepository,
};
use parley_core::types::{
    Channel, Conversation, ConversationQuery, ConversationUpdate, ExternalUser,
    ExternalUserUpdate, Message, MessageQuery, MessageStatus, NewChannel, NewConversation,
    NewExternalUser, NewMessage, NewOrganization, NewWebhookEvent, Organization, WebhookEvent,
};
use parley_core::{AdapterType, HealthStatus, ParleyError, PluginAdapter, StorageAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules. The
/// database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Returns the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    // --- Tenancy (only what webhook routing needs) ---

    pub async fn create_organization(
        &self,
        org: &NewOrganization,
    ) -> Result<Organization, ParleyError> {
        queries::organizations::create(self.db()?, org).await
    }

    pub async fn get_organization(&self, id: i64) -> Result<Option<Organization>, ParleyError> {
        queries::organizations::get_by_id(self.db()?, id).await
    }

    pub async fn get_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, ParleyError> {
        queries::organizations::get_by_slug(self.db()?, slug).await
    }

    pub async fn create_channel(&self, channel: &NewChannel) -> Result<Channel, ParleyError> {
        queries::channels::create(self.db()?, channel).await
    }

    pub async fn get_channel(&self, id: i64) -> Result<Option<Channel>, ParleyError> {
        queries::channels::get_by_id(self.db()?, id).await
    }

    pub async fn list_channels(
        &self,
        organization_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Channel>, ParleyError> {
        queries::channels::list_by_organization(self.db()?, organization_id, limit, offset).await
    }

    async fn checkpoint(&self) -> Result<(), ParleyError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let db = match self.db() {
            Ok(db) => db,
            Err(_) => return Ok(HealthStatus::Unhealthy("not initialized".into())),
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if self.db.get().is_some() {
            self.checkpoint().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open(&self.config).await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        self.checkpoint().await
    }
}

#[async_trait]
impl ExternalUserRepository for SqliteStorage {
    async fn create(&self, user: &NewExternalUser) -> Result<ExternalUser, ParleyError> {
        queries::external_users::create(self.db()?, user).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ExternalUser>, ParleyError> {
        queries::external_users::get_by_id(self.db()?, id).await
    }

    async fn get_by_channel_and_platform_id(
        &self,
        channel_id: i64,
        platform_user_id: &str,
    ) -> Result<Option<ExternalUser>, ParleyError> {
        queries::external_users::get_by_channel_and_platform_id(
            self.db()?,
            channel_id,
            platform_user_id,
        )
        .await
    }

    async fn find_or_create(&self, user: &NewExternalUser) -> Result<ExternalUser, ParleyError> {
        queries::external_users::find_or_create(self.db()?, user).await
    }

    async fn update(
        &self,
        id: i64,
        update: &ExternalUserUpdate,
    ) -> Result<ExternalUser, ParleyError> {
        queries::external_users::update(self.db()?, id, update).await
    }

    async fn touch_last_seen(&self, id: i64) -> Result<(), ParleyError> {
        queries::external_users::touch_last_seen(self.db()?, id).await
    }
}

#[async_trait]
impl ConversationRepository for SqliteStorage {
    async fn create(&self, conversation: &NewConversation) -> Result<Conversation, ParleyError> {
        queries::conversations::create(self.db()?, conversation).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Conversation>, ParleyError> {
        queries::conversations::get_by_id(self.db()?, id).await
    }

    async fn get_or_create_open_for_user(
        &self,
        channel_id: i64,
        external_user_id: i64,
    ) -> Result<(Conversation, bool), ParleyError> {
        queries::conversations::get_or_create_open_for_user(
            self.db()?,
            channel_id,
            external_user_id,
        )
        .await
    }

    async fn list(
        &self,
        channel_id: i64,
        query: &ConversationQuery,
    ) -> Result<Vec<Conversation>, ParleyError> {
        queries::conversations::list(self.db()?, channel_id, query).await
    }

    async fn update(
        &self,
        id: i64,
        update: &ConversationUpdate,
    ) -> Result<Conversation, ParleyError> {
        queries::conversations::update(self.db()?, id, update).await
    }

    async fn touch_last_message(&self, id: i64) -> Result<(), ParleyError> {
        queries::conversations::touch_last_message(self.db()?, id).await
    }
}

#[async_trait]
impl MessageRepository for SqliteStorage {
    async fn create(&self, message: &NewMessage) -> Result<Message, ParleyError> {
        queries::messages::create(self.db()?, message).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Message>, ParleyError> {
        queries::messages::get_by_id(self.db()?, id).await
    }

    async fn list_by_conversation(
        &self,
        conversation_id: i64,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, ParleyError> {
        queries::messages::list_by_conversation(self.db()?, conversation_id, query).await
    }

    async fn update_status(&self, id: i64, status: MessageStatus) -> Result<(), ParleyError> {
        queries::messages::update_status(self.db()?, id, status).await
    }
}

#[async_trait]
impl WebhookEventRepository for SqliteStorage {
    async fn create(&self, event: &NewWebhookEvent) -> Result<WebhookEvent, ParleyError> {
        queries::webhook_events::create(self.db()?, event).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<WebhookEvent>, ParleyError> {
        queries::webhook_events::get_by_id(self.db()?, id).await
    }

    async fn list_unprocessed(
        &self,
        channel_id: i64,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, ParleyError> {
        queries::webhook_events::list_unprocessed(self.db()?, channel_id, limit).await
    }

    async fn list_failed(
        &self,
        channel_id: i64,
        limit: i64,
    ) -> Result<Vec<WebhookEvent>, ParleyError> {
        queries::webhook_events::list_failed(self.db()?, channel_id, limit).await
    }

    async fn mark_processed(&self, id: i64) -> Result<(), ParleyError> {
        queries::webhook_events::mark_processed(self.db()?, id).await
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), ParleyError> {
        queries::webhook_events::mark_failed(self.db()?, id, error).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::Platform;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            ..StorageConfig::default()
        }
    }

    #[tokio::test]
    async fn sqlite_storage_identifies_itself() {
        let storage = SqliteStorage::new(make_config(":memory:"));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        storage.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn health_reflects_initialization() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));

        assert!(matches!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn repositories_fail_cleanly_before_initialize() {
        let storage = SqliteStorage::new(make_config(":memory:"));
        let err = MessageRepository::get_by_id(&storage, 1).await.unwrap_err();
        assert!(matches!(err, ParleyError::Storage { .. }));
    }

    #[tokio::test]
    async fn tenancy_and_threading_through_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let storage = SqliteStorage::new(make_config(db_path.to_str().unwrap()));
        storage.initialize().await.unwrap();

        let org = storage
            .create_organization(&NewOrganization {
                name: "Acme".into(),
                slug: "acme".into(),
                metadata: None,
            })
            .await
            .unwrap();
        let channel = storage
            .create_channel(&NewChannel {
                organization_id: org.id,
                platform: Platform::Whatsapp,
                name: "c1".into(),
                account_identifier: None,
                webhook_secret: None,
                access_token: None,
                config: None,
            })
            .await
            .unwrap();
        assert_eq!(storage.list_channels(org.id, 0, 0).await.unwrap().len(), 1);

        let user = storage
            .find_or_create(&NewExternalUser {
                channel_id: channel.id,
                platform_user_id: "wa-42".into(),
                ..NewExternalUser::default()
            })
            .await
            .unwrap();
        let (conv, created) = storage
            .get_or_create_open_for_user(channel.id, user.id)
            .await
            .unwrap();
        assert!(created);
        assert_eq!(conv.external_user_id, user.id);

        storage.shutdown().await.unwrap();
    }
}
