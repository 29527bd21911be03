// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley webhooks` operator commands.
//!
//! Listing reads the audit trail; replay pushes a recorded payload back
//! through the live pipeline, notifications included.

use std::io::IsTerminal;

use parley_chat::{ChatServices, Repositories};
use parley_config::ParleyConfig;
use parley_core::types::WebhookEvent;
use parley_core::{ParleyError, StorageAdapter};

use crate::serve::{build_event_bus, open_storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Unprocessed,
    Failed,
}

/// Longest error text shown in table mode.
const ERROR_WIDTH: usize = 60;

pub async fn run_list(
    config: &ParleyConfig,
    listing: Listing,
    channel_id: i64,
    limit: i64,
    json: bool,
    plain: bool,
) -> Result<(), ParleyError> {
    let storage = open_storage(config).await?;
    let services = ChatServices::new(
        Repositories::from_store(storage.clone()),
        parley_bus::Notifier::disabled(),
    );

    let events = match listing {
        Listing::Unprocessed => services.webhooks.list_unprocessed(channel_id, limit).await,
        Listing::Failed => services.webhooks.list_failed(channel_id, limit).await,
    };
    storage.close().await?;
    let events = events?;

    if json {
        let out = serde_json::to_string_pretty(&events)
            .map_err(|e| ParleyError::Internal(format!("failed to encode output: {e}")))?;
        println!("{out}");
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print!("{}", render_table(&events, use_color));
    }
    Ok(())
}

pub async fn run_replay(config: &ParleyConfig, webhook_event_id: i64) -> Result<(), ParleyError> {
    let storage = open_storage(config).await?;
    let bus = build_event_bus(&config.events).await;
    let services = ChatServices::new(
        Repositories::from_store(storage.clone()),
        bus.notifier.clone(),
    );

    let result = services.webhooks.replay(webhook_event_id).await;

    bus.shutdown().await;
    storage.close().await?;

    result?;
    println!("webhook event {webhook_event_id} replayed");
    Ok(())
}

/// One row per event. Cells are padded before coloring so ANSI codes do
/// not skew the columns.
fn render_table(events: &[WebhookEvent], use_color: bool) -> String {
    use colored::Colorize;

    if events.is_empty() {
        return "no webhook events\n".to_string();
    }

    let header = format!(
        "{:<8} {:<16} {:<26} {:<9} {}",
        "ID", "EVENT TYPE", "RECEIVED", "PROCESSED", "ERROR"
    );
    let mut out = if use_color {
        header.bold().to_string()
    } else {
        header
    };
    out.push('\n');

    for event in events {
        let processed = format!("{:<9}", if event.processed { "yes" } else { "no" });
        let error = truncate(event.error.as_deref().unwrap_or("-"), ERROR_WIDTH);
        let (processed, error) = if !use_color {
            (processed, error)
        } else if event.error.is_some() {
            (processed.yellow().to_string(), error.red().to_string())
        } else if event.processed {
            (processed.green().to_string(), error)
        } else {
            (processed.yellow().to_string(), error)
        };
        out.push_str(&format!(
            "{:<8} {:<16} {:<26} {} {}\n",
            event.id,
            event.event_type,
            event.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            processed,
            error,
        ));
    }
    out
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
