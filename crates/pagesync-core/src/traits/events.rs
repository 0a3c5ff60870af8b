// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event emission seam toward the delivery-transport collaborator.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::SyncEvent;

/// Side channel for pushing engine events to connected clients.
///
/// The actual fan-out transport (connection registry, per-client delivery)
/// lives outside this workspace. Emission is fire-and-forget from the
/// engine's perspective: callers log a sink error and continue; a failed
/// emit never fails the triggering pipeline step.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emit one event routed by page id.
    async fn emit(&self, page_id: &str, event: SyncEvent) -> Result<(), SyncError>;
}

/// Sink that drops every event. Used by call sites with no requester
/// attached (e.g. an unattended backfill run) and by tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, _page_id: &str, _event: SyncEvent) -> Result<(), SyncError> {
        Ok(())
    }
}
