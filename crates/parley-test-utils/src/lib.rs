// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for parley.
//!
//! - [`MemoryStore`] - in-memory fake of all four repositories, with switches
//!   that make individual operations fail
//! - [`RecordingSink`] - event sink that keeps every envelope for assertions
//! - [`FailingSink`] - event sink that always errors
//! - [`TestHarness`] - services wired to a temp SQLite database and a
//!   recording sink

pub mod harness;
pub mod memory;
pub mod sinks;

pub use harness::TestHarness;
pub use memory::{FailPoint, MemoryStore};
pub use sinks::{FailingSink, RecordingSink};
