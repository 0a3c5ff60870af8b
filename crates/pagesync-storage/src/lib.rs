// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the pagesync conversation store.
//!
//! One tokio-rusqlite connection serializes all writes through a single
//! background thread; compound read-modify-write operations (find-or-create,
//! insert-if-absent, guarded state transitions) run inside one connection
//! closure each, which gives the engine its single-writer-per-conversation
//! guarantee.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::BackfillRun;
