// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model types for storage entities.
//!
//! The canonical conversation/message types live in `pagesync-core::types`
//! for use across trait boundaries; this module re-exports them and defines
//! the one storage-owned record, the persisted backfill run.

use serde::{Deserialize, Serialize};

pub use pagesync_core::types::{Conversation, ConversationKind, Message, RunCounters};

/// A persisted backfill run with its incrementally-updated counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRun {
    pub id: String,
    pub page_id: String,
    /// Client that initiated the run, when progress reporting is wanted.
    pub requester: Option<String>,
    pub counters: RunCounters,
    pub started_at: i64,
}
