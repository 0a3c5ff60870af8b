// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the pagesync workspace.
//!
//! All timestamps are epoch milliseconds on the *external* clock (the
//! remote service's `created_time`), decoded once at the graph boundary.
//! Local wall-clock time never participates in state comparisons.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Whether a conversation groups direct chat messages or post comments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Message,
    Comment,
}

/// One thread between a page and one external counterpart.
///
/// Exactly one open conversation exists per `(page_id, from_id)` for the
/// `message` kind and per `(page_id, from_id, post_id)` for the `comment`
/// kind, except where a reply inherits its parent's conversation. Created
/// lazily on the first seen unit and never hard-deleted; mutated only
/// through the state updater.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub kind: ConversationKind,
    pub page_id: String,
    /// Present only for comment conversations.
    pub post_id: Option<String>,
    /// Top-level comment that opened a comment conversation, when known.
    pub root_comment_id: Option<String>,
    /// External counterpart user id.
    pub from_id: String,
    /// Short preview of the most recent qualifying unit.
    pub snippet: String,
    pub created_time: i64,
    /// External-clock timestamp of the most recent qualifying unit.
    pub updated_time: i64,
    pub unread_count: i64,
    pub replied: bool,
    pub seen: bool,
    /// External-clock timestamp of the most recent non-page unit.
    pub last_user_message_at: Option<i64>,
    /// Read receipt watermark; message conversations only.
    pub read_watermark: Option<i64>,
}

/// One ingested unit: a chat message or a comment/sub-comment.
///
/// `external_id` is unique per page and serves as the idempotency key;
/// re-ingesting the same `(page_id, external_id)` is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub kind: ConversationKind,
    pub page_id: String,
    /// The remote system's id for this unit.
    pub external_id: String,
    pub from_id: String,
    pub body: String,
    pub created_time: i64,
    pub has_attachments: bool,
    pub attachment_kind: Option<String>,
    /// Remote target ids of attached media, when any.
    pub attachment_targets: Vec<String>,
    pub sent: bool,
    pub delivered: bool,
    pub deleted: bool,
}

/// One externally-sourced unit headed into the resolve → ingest → apply
/// pipeline, already decoded from its wire shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingUnit {
    pub kind: ConversationKind,
    pub external_id: String,
    pub page_id: String,
    /// Author of the unit (may be the page itself).
    pub from_id: String,
    /// The external party of the thread. For page-authored chat units this
    /// is the recipient, not the author.
    pub counterpart_id: String,
    pub post_id: Option<String>,
    /// Remote id of the parent comment, for replies.
    pub parent_external_id: Option<String>,
    pub body: String,
    pub created_time: i64,
    /// Whether the page authored this unit.
    pub from_page: bool,
    pub has_attachments: bool,
    pub attachment_kind: Option<String>,
    pub attachment_targets: Vec<String>,
    pub sent: bool,
    pub delivered: bool,
}

/// Per-run counters owned by the backfill walker, persisted incrementally
/// so a crashed run shows partial progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounters {
    pub post_count: i64,
    pub conversation_count: i64,
    pub message_count: i64,
    pub comment_count: i64,
    pub end_at: Option<i64>,
}

impl RunCounters {
    /// Accumulate another counter set into this one.
    pub fn add(&mut self, other: &RunCounters) {
        self.post_count += other.post_count;
        self.conversation_count += other.conversation_count;
        self.message_count += other.message_count;
        self.comment_count += other.comment_count;
    }
}

/// Events emitted to the delivery-transport collaborator.
///
/// Each event travels with a page-scoped routing key supplied at the
/// [`EventSink`](crate::traits::EventSink) call site. Emission is
/// fire-and-forget: a sink failure never fails the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEvent {
    #[serde(rename = "CONVERSATION_UPDATED", rename_all = "camelCase")]
    ConversationUpdated {
        conversation_id: String,
        conversation: Conversation,
        new_message: Message,
    },
    #[serde(rename = "COMMENT_UPDATED", rename_all = "camelCase")]
    CommentUpdated {
        conversation_id: String,
        conversation: Conversation,
        updated_message: Message,
    },
    #[serde(rename = "COMMENT_DELETED", rename_all = "camelCase")]
    CommentDeleted { deleted_message: Message },
    /// Incremental backfill progress: one named counter's running value.
    #[serde(rename = "BACKFILL_PROGRESS", rename_all = "camelCase")]
    Progress { counter_name: String, value: i64 },
    /// Terminal backfill notification, emitted exactly once per run.
    #[serde(rename = "BACKFILL_FINISHED", rename_all = "camelCase")]
    Finished { status: String, page_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn conversation_kind_round_trips() {
        for kind in [ConversationKind::Message, ConversationKind::Comment] {
            let s = kind.to_string();
            assert_eq!(ConversationKind::from_str(&s).unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            let parsed: ConversationKind = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, kind);
        }
        assert_eq!(ConversationKind::Message.to_string(), "message");
    }

    #[test]
    fn sync_event_serializes_with_wire_tags() {
        let event = SyncEvent::Progress {
            counter_name: "commentCount".into(),
            value: 7,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BACKFILL_PROGRESS");
        assert_eq!(json["counterName"], "commentCount");
        assert_eq!(json["value"], 7);

        let done = SyncEvent::Finished {
            status: "finished".into(),
            page_id: "page-1".into(),
        };
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["type"], "BACKFILL_FINISHED");
        assert_eq!(json["pageId"], "page-1");
    }

    #[test]
    fn run_counters_accumulate() {
        let mut total = RunCounters::default();
        total.add(&RunCounters {
            post_count: 1,
            comment_count: 3,
            ..Default::default()
        });
        total.add(&RunCounters {
            comment_count: 2,
            message_count: 5,
            ..Default::default()
        });
        assert_eq!(total.post_count, 1);
        assert_eq!(total.comment_count, 5);
        assert_eq!(total.message_count, 5);
        assert_eq!(total.end_at, None);
    }
}
