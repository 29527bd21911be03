// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Limit/offset normalization for list operations.
//!
//! Out-of-range limits fall back to the caller's default rather than being
//! clamped to the nearest bound, so `limit=500` never turns into a 100-row read
//! the client did not ask for.

/// Default page size for organizations, channels, and conversations.
pub const DEFAULT_LIMIT: i64 = 20;

/// Default page size for message history.
pub const MESSAGE_DEFAULT_LIMIT: i64 = 50;

/// Upper bound for any page.
pub const MAX_LIMIT: i64 = 100;

/// Returns `limit` when it lies in `(0, MAX_LIMIT]`, otherwise `default`.
pub fn normalize_limit(limit: i64, default: i64) -> i64 {
    if limit <= 0 || limit > MAX_LIMIT {
        default
    } else {
        limit
    }
}

/// Negative offsets become zero.
pub fn normalize_offset(offset: i64) -> i64 {
    offset.max(0)
}
