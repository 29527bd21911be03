// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget front end for an [`EventSink`].
//!
//! `notify` pushes onto a bounded queue and returns. One worker task drains
//! the queue in order and calls the sink under a timeout. A full queue, a
//! slow bus, or a failed publish costs the caller nothing beyond a log line.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parley_core::EventSink;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Pending {
    event_type: String,
    payload: Map<String, Value>,
    metadata: BTreeMap<String, String>,
}

/// Cheap to clone; every clone feeds the same worker.
#[derive(Clone)]
pub struct Notifier {
    tx: Option<mpsc::Sender<Pending>>,
}

/// Owns the worker task. Dropping it without calling
/// [`shutdown`](Self::shutdown) leaves the worker running until every
/// `Notifier` clone is gone.
pub struct NotifierHandle {
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl Notifier {
    /// Spawn the worker on the current Tokio runtime.
    pub fn start(
        sink: Arc<dyn EventSink>,
        capacity: usize,
        emit_timeout: Duration,
    ) -> (Self, NotifierHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(sink, rx, emit_timeout, cancel.clone()));
        (Self { tx: Some(tx) }, NotifierHandle { cancel, worker })
    }

    /// A notifier that drops every event without logging.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn notify(&self, event_type: &str, payload: Map<String, Value>) {
        self.notify_with_metadata(event_type, payload, BTreeMap::new());
    }

    pub fn notify_with_metadata(
        &self,
        event_type: &str,
        payload: Map<String, Value>,
        metadata: BTreeMap<String, String>,
    ) {
        let Some(tx) = &self.tx else { return };
        let pending = Pending {
            event_type: event_type.to_string(),
            payload,
            metadata,
        };
        match tx.try_send(pending) {
            Ok(()) => {}
            Err(TrySendError::Full(p)) => {
                tracing::warn!(event_type = %p.event_type, "event queue full, dropping event");
            }
            Err(TrySendError::Closed(p)) => {
                tracing::debug!(event_type = %p.event_type, "event worker stopped, dropping event");
            }
        }
    }
}

impl NotifierHandle {
    /// Stop accepting work and flush what is queued, waiting at most `grace`.
    pub async fn shutdown(self, grace: Duration) {
        self.cancel.cancel();
        match tokio::time::timeout(grace, self.worker).await {
            Ok(Ok(())) => tracing::debug!("event worker drained"),
            Ok(Err(e)) => tracing::warn!(error = %e, "event worker panicked"),
            Err(_) => tracing::warn!(?grace, "event worker did not drain in time"),
        }
    }
}

async fn run_worker(
    sink: Arc<dyn EventSink>,
    mut rx: mpsc::Receiver<Pending>,
    emit_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            next = rx.recv() => match next {
                Some(p) => deliver(sink.as_ref(), p, emit_timeout).await,
                None => return,
            },
            () = cancel.cancelled() => break,
        }
    }

    rx.close();
    while let Some(p) = rx.recv().await {
        deliver(sink.as_ref(), p, emit_timeout).await;
    }
}

async fn deliver(sink: &dyn EventSink, p: Pending, emit_timeout: Duration) {
    let event_type = p.event_type;
    let emit = sink.emit_with_metadata(&event_type, p.payload, p.metadata);
    match tokio::time::timeout(emit_timeout, emit).await {
        Ok(Ok(())) => tracing::trace!(%event_type, "event emitted"),
        Ok(Err(e)) => tracing::warn!(%event_type, error = %e, "failed to emit event"),
        Err(_) => tracing::warn!(%event_type, ?emit_timeout, "event emission timed out"),
    }
}
