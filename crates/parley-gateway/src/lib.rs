// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for parley.
//!
//! Platform webhooks arrive on a public route and go straight into the
//! webhook pipeline. The conversation and message API sits behind an
//! optional bearer token.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use error::ApiError;
pub use server::{GatewayState, ListenConfig, router, serve};
