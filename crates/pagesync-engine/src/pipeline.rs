// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared resolve → ingest → apply pipeline.
//!
//! Webhook dispatch and backfill walking are two independent entry points
//! into this one path; both produce identical final state for the same
//! underlying units because ingestion is idempotent per external id and
//! state updates are monotonic by timestamp.

use std::sync::Arc;

use pagesync_core::{Conversation, EventSink, IncomingUnit, LookupCache, Message, SyncError, SyncEvent};
use pagesync_storage::Database;
use tracing::warn;

use crate::{ingest, resolver, state};

/// Result of feeding one unit through the pipeline.
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub conversation: Conversation,
    pub message: Message,
    /// The unit opened a new conversation.
    pub conversation_created: bool,
    /// The unit was seen for the first time (false on replays).
    pub message_created: bool,
}

/// Shared pipeline state handed to both entry points.
#[derive(Clone)]
pub struct Pipeline {
    db: Database,
    cache: Option<Arc<dyn LookupCache>>,
    sink: Arc<dyn EventSink>,
}

impl Pipeline {
    pub fn new(
        db: Database,
        cache: Option<Arc<dyn LookupCache>>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self { db, cache, sink }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Feed one unit through resolve → ingest → apply.
    ///
    /// A replayed unit (already-known external id) returns the stored row
    /// without touching conversation state and without emitting. A newly
    /// created conversation is already seeded from this unit, so the state
    /// update runs only for units landing in an existing conversation.
    pub async fn process_unit(&self, unit: &IncomingUnit) -> Result<UnitOutcome, SyncError> {
        let (conversation, conversation_created) =
            resolver::resolve(&self.db, self.cache.as_deref(), unit).await?;
        let (message, existed) = ingest::ingest(&self.db, &conversation.id, unit).await?;

        if existed {
            return Ok(UnitOutcome {
                conversation,
                message,
                conversation_created,
                message_created: false,
            });
        }

        let conversation = if conversation_created {
            conversation
        } else {
            state::apply(&self.db, &conversation, unit, 1).await?
        };

        self.emit(
            &unit.page_id,
            SyncEvent::ConversationUpdated {
                conversation_id: conversation.id.clone(),
                conversation: conversation.clone(),
                new_message: message.clone(),
            },
        )
        .await;

        Ok(UnitOutcome {
            conversation,
            message,
            conversation_created,
            message_created: true,
        })
    }

    /// Fire-and-forget emission: a sink failure is logged, never surfaced.
    pub(crate) async fn emit(&self, page_id: &str, event: SyncEvent) {
        if let Err(e) = self.sink.emit(page_id, event).await {
            warn!(page_id, error = %e, "event emission failed");
        }
    }
}
