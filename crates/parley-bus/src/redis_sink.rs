// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Redis pub/sub sink.
//!
//! Each event is published as a JSON [`EventEnvelope`] on the Redis channel
//! named after its event type, e.g. `chat.message.new`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::EventsConfig;
use parley_core::{AdapterType, EventEnvelope, EventSink, HealthStatus, ParleyError, PluginAdapter};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde_json::{Map, Value};

pub struct RedisSink {
    manager: ConnectionManager,
    source: String,
    timeout: Duration,
}

impl RedisSink {
    /// Open a managed connection and confirm it with `PING`.
    ///
    /// Both steps share `connect_timeout_ms`. The connection manager
    /// reconnects on its own after this succeeds.
    pub async fn connect(config: &EventsConfig) -> Result<Self, ParleyError> {
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| sink_error("invalid redis url", e))?;

        let mut manager = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| ParleyError::Timeout { duration: timeout })?
            .map_err(|e| sink_error("failed to connect to redis", e))?;

        ping(&mut manager, timeout).await?;
        tracing::info!(source = %config.source, "connected to redis event bus");

        Ok(Self {
            manager,
            source: config.source.clone(),
            timeout,
        })
    }
}

async fn ping(manager: &mut ConnectionManager, timeout: Duration) -> Result<(), ParleyError> {
    let _: String = tokio::time::timeout(timeout, redis::cmd("PING").query_async(manager))
        .await
        .map_err(|_| ParleyError::Timeout { duration: timeout })?
        .map_err(|e| sink_error("redis ping failed", e))?;
    Ok(())
}

fn sink_error(message: &str, source: redis::RedisError) -> ParleyError {
    ParleyError::EventSink {
        message: format!("{message}: {source}"),
        source: Some(Box::new(source)),
    }
}

#[async_trait]
impl EventSink for RedisSink {
    async fn emit_with_metadata(
        &self,
        event_type: &str,
        payload: Map<String, Value>,
        metadata: BTreeMap<String, String>,
    ) -> Result<(), ParleyError> {
        let envelope = EventEnvelope::new(event_type, &self.source, payload, metadata);
        let body = serde_json::to_string(&envelope).map_err(ParleyError::Serialization)?;

        let mut conn = self.manager.clone();
        let receivers: i64 = conn
            .publish(event_type, body)
            .await
            .map_err(|e| sink_error("publish failed", e))?;
        tracing::debug!(event_type, id = %envelope.id, receivers, "event published");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for RedisSink {
    fn name(&self) -> &str {
        "redis"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::EventSink
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let mut conn = self.manager.clone();
        Ok(match ping(&mut conn, self.timeout).await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_url() {
        let config = EventsConfig {
            enabled: true,
            redis_url: "not a url".into(),
            ..EventsConfig::default()
        };
        let err = RedisSink::connect(&config).await.err().unwrap();
        assert!(matches!(err, ParleyError::EventSink { .. }), "{err}");
    }

    #[tokio::test]
    async fn unreachable_server_fails_within_timeout() {
        let config = EventsConfig {
            enabled: true,
            // Reserved port; nothing listens there.
            redis_url: "redis://127.0.0.1:1/0".into(),
            connect_timeout_ms: 200,
            ..EventsConfig::default()
        };
        let started = std::time::Instant::now();
        assert!(RedisSink::connect(&config).await.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
