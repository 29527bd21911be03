// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` and `parley migrate`.

use std::sync::Arc;
use std::time::Duration;

use parley_bus::{Notifier, NotifierHandle, RedisSink};
use parley_chat::{ChatServices, Repositories};
use parley_config::ParleyConfig;
use parley_config::model::EventsConfig;
use parley_core::{EventSink, ParleyError, PluginAdapter, StorageAdapter};
use parley_gateway::{GatewayState, ListenConfig};
use parley_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long queued notifications get to flush on shutdown.
const NOTIFIER_GRACE: Duration = Duration::from_secs(5);

/// Open storage and run pending migrations.
pub async fn open_storage(config: &ParleyConfig) -> Result<Arc<SqliteStorage>, ParleyError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

/// The notifier plus what `serve` needs to report on and drain it.
pub struct EventBus {
    pub notifier: Notifier,
    pub handle: Option<NotifierHandle>,
    pub health: Option<Arc<dyn PluginAdapter>>,
}

impl EventBus {
    fn disabled() -> Self {
        Self {
            notifier: Notifier::disabled(),
            handle: None,
            health: None,
        }
    }

    /// Flush queued notifications.
    pub async fn shutdown(self) {
        if let Some(handle) = self.handle {
            handle.shutdown(NOTIFIER_GRACE).await;
        }
    }
}

/// Build the notifier for the configured bus.
///
/// A bus that cannot be reached at startup is not fatal: the process runs
/// with notifications off.
pub async fn build_event_bus(config: &EventsConfig) -> EventBus {
    if !config.enabled {
        info!("event bus disabled by configuration");
        return EventBus::disabled();
    }

    match RedisSink::connect(config).await {
        Ok(sink) => {
            info!(url = %redact_url(&config.redis_url), "event bus connected");
            let sink = Arc::new(sink);
            let (notifier, handle) = Notifier::start(
                sink.clone() as Arc<dyn EventSink>,
                config.queue_capacity,
                Duration::from_millis(config.emit_timeout_ms),
            );
            EventBus {
                notifier,
                handle: Some(handle),
                health: Some(sink as Arc<dyn PluginAdapter>),
            }
        }
        Err(e) => {
            warn!(error = %e, "event bus unavailable, continuing without notifications");
            EventBus::disabled()
        }
    }
}

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    info!(
        environment = ?config.server.environment,
        "starting parley serve"
    );

    let storage = open_storage(&config).await?;
    let bus = build_event_bus(&config.events).await;
    let services = ChatServices::new(
        Repositories::from_store(storage.clone()),
        bus.notifier.clone(),
    );

    let mut state = GatewayState::new(services, storage.clone() as Arc<dyn PluginAdapter>);
    if let Some(health) = &bus.health {
        state = state.with_event_bus(health.clone());
    }
    let auth = parley_gateway::AuthConfig {
        bearer_token: config.auth.bearer_token.clone(),
    };
    if auth.bearer_token.is_none() {
        warn!("no bearer token configured, conversation API is unauthenticated");
    }
    let app = parley_gateway::router(state, auth, &config.cors);

    let listen = ListenConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    let cancel = shutdown_token();
    let served = parley_gateway::serve(&listen, app, cancel).await;

    info!("shutting down");
    bus.shutdown().await;
    if let Err(e) = storage.close().await {
        warn!(error = %e, "failed to close storage cleanly");
    }

    served
}

/// Runs the `parley migrate` command.
pub async fn run_migrate(config: &ParleyConfig) -> Result<(), ParleyError> {
    let storage = open_storage(config).await?;
    storage.close().await?;
    println!(
        "migrations applied to {}",
        config.storage.database_path
    );
    Ok(())
}

/// Cancelled on the first SIGINT or SIGTERM.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        cancel.cancel();
    });
    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!(error = %e, "SIGTERM unavailable, stopping on SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!(signal = "SIGINT", "stopping"),
        _ = term.recv() => info!(signal = "SIGTERM", "stopping"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!(signal = "ctrl-c", "stopping");
}

/// Strip credentials from a connection URL before logging it.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
