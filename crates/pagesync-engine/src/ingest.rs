// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent message ingestion.
//!
//! Inserting is deliberately decoupled from the conversation state update:
//! call sites decide whether a given ingestion should also move counters
//! (a replayed unit must not, a backfilled old sub-comment still should).

use pagesync_core::{IncomingUnit, Message, SyncError};
use pagesync_storage::queries::messages::insert_message_if_absent;
use pagesync_storage::Database;
use tracing::trace;
use uuid::Uuid;

/// Materialize the row a unit would insert.
pub(crate) fn build_message(conversation_id: &str, unit: &IncomingUnit) -> Message {
    Message {
        id: Uuid::new_v4().to_string(),
        conversation_id: conversation_id.to_string(),
        kind: unit.kind,
        page_id: unit.page_id.clone(),
        external_id: unit.external_id.clone(),
        from_id: unit.from_id.clone(),
        body: unit.body.clone(),
        created_time: unit.created_time,
        has_attachments: unit.has_attachments,
        attachment_kind: unit.attachment_kind.clone(),
        attachment_targets: unit.attachment_targets.clone(),
        sent: unit.sent,
        delivered: unit.delivered,
        deleted: false,
    }
}

/// Insert a message row for the unit exactly once per `(page_id,
/// external_id)`, regardless of how many times the unit is observed.
///
/// Returns the row and whether it already existed. A replay returns the
/// original row unchanged.
pub async fn ingest(
    db: &Database,
    conversation_id: &str,
    unit: &IncomingUnit,
) -> Result<(Message, bool), SyncError> {
    let (message, existed) = insert_message_if_absent(db, build_message(conversation_id, unit)).await?;
    trace!(
        external_id = unit.external_id,
        conversation_id,
        existed,
        "unit ingested"
    );
    Ok((message, existed))
}
