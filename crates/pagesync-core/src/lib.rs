// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the pagesync reconciliation engine.
//!
//! This crate provides the error taxonomy, domain types, event payloads,
//! and the trait seams (event emission, lookup caching) shared by the rest
//! of the workspace.

pub mod cache;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use cache::TtlCache;
pub use error::SyncError;
pub use traits::{EventSink, LookupCache};
pub use types::{Conversation, ConversationKind, IncomingUnit, Message, RunCounters, SyncEvent};
