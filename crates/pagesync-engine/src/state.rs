// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation state machine.
//!
//! A unit qualifies when its `created_time` is at or after the
//! conversation's current `updated_time`: only newest-so-far units move
//! displayed state forward, so stale backfilled units can never regress a
//! conversation. At equal timestamps the unit presented last wins; callers
//! present units in non-decreasing `created_time` order per conversation
//! for a deterministic result.
//!
//! A persistence failure here is surfaced to the caller, but the
//! triggering unit is already durably ingested; only the counter effect is
//! retryable.

use pagesync_core::{Conversation, IncomingUnit, SyncError};
use pagesync_storage::queries::conversations::{apply_state_change, StateChange};
use pagesync_storage::Database;
use tracing::debug;

use crate::unit::snippet_of;

/// Apply one unit to the conversation state machine.
///
/// For external-authored units `increment` is the unread delta, normally 1;
/// a caller reconciling several units at once may pass the batch size with
/// the newest unit. Page-authored units ignore it. Returns the
/// conversation as now persisted, whether or not the unit qualified.
pub async fn apply(
    db: &Database,
    conversation: &Conversation,
    unit: &IncomingUnit,
    increment: i64,
) -> Result<Conversation, SyncError> {
    if unit.created_time < conversation.updated_time {
        debug!(
            conversation_id = conversation.id,
            unit = unit.external_id,
            unit_time = unit.created_time,
            state_time = conversation.updated_time,
            "unit does not qualify; state unchanged"
        );
        return Ok(conversation.clone());
    }

    let change = StateChange {
        snippet: snippet_of(&unit.body),
        updated_time: unit.created_time,
        from_page: unit.from_page,
        increment,
        last_user_message_at: (!unit.from_page).then_some(unit.created_time),
    };
    let (updated, applied) = apply_state_change(db, &conversation.id, change).await?;
    if !applied {
        // A newer unit won the row between our read and this write.
        debug!(
            conversation_id = conversation.id,
            unit = unit.external_id,
            "guarded update skipped; newer state already applied"
        );
    }
    Ok(updated)
}
