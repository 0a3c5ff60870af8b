// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookup, lazy creation, and the guarded state transition.
//!
//! Find-or-create runs inside a single connection-thread closure, so the
//! application-level uniqueness on `(page_id, from_id, kind[, post_id])`
//! holds even when a webhook dispatch and a backfill run interleave. The
//! state transition is one guarded UPDATE (`WHERE updated_time <= ?`) with
//! an in-SQL counter increment, so stale backfilled units can never regress
//! displayed state and increments are atomic.

use pagesync_core::SyncError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{Conversation, ConversationKind};
use crate::queries::parse_kind;

/// Seed values for a lazily-created conversation.
///
/// A conversation opened by a page-authored unit starts read and replied;
/// one opened by an external unit starts with one unread and `replied`
/// false. `created_time == updated_time` on creation.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub id: String,
    pub kind: ConversationKind,
    pub page_id: String,
    pub post_id: Option<String>,
    pub root_comment_id: Option<String>,
    pub from_id: String,
    pub snippet: String,
    pub created_time: i64,
    pub from_page: bool,
}

/// One state transition of the conversation state machine.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub snippet: String,
    pub updated_time: i64,
    pub from_page: bool,
    /// Unread delta for external-authored units; callers reconciling a
    /// batch may pass the batch size instead of 1.
    pub increment: i64,
    pub last_user_message_at: Option<i64>,
}

const CONVERSATION_COLUMNS: &str = "id, kind, page_id, post_id, root_comment_id, from_id, \
     snippet, created_time, updated_time, unread_count, replied, seen, \
     last_user_message_at, read_watermark";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        kind: parse_kind(1, row.get(1)?)?,
        page_id: row.get(2)?,
        post_id: row.get(3)?,
        root_comment_id: row.get(4)?,
        from_id: row.get(5)?,
        snippet: row.get(6)?,
        created_time: row.get(7)?,
        updated_time: row.get(8)?,
        unread_count: row.get(9)?,
        replied: row.get(10)?,
        seen: row.get(11)?,
        last_user_message_at: row.get(12)?,
        read_watermark: row.get(13)?,
    })
}

fn insert_conversation(
    conn: &rusqlite::Connection,
    seed: &NewConversation,
) -> rusqlite::Result<Conversation> {
    let unread = if seed.from_page { 0_i64 } else { 1 };
    conn.execute(
        "INSERT INTO conversations (id, kind, page_id, post_id, root_comment_id, from_id, \
         snippet, created_time, updated_time, unread_count, replied, seen, last_user_message_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?10, ?10, ?11)",
        params![
            seed.id,
            seed.kind.to_string(),
            seed.page_id,
            seed.post_id,
            seed.root_comment_id,
            seed.from_id,
            seed.snippet,
            seed.created_time,
            unread,
            seed.from_page,
            if seed.from_page {
                None
            } else {
                Some(seed.created_time)
            },
        ],
    )?;
    conn.query_row(
        &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
        params![seed.id],
        row_to_conversation,
    )
}

/// Find the open message conversation for `(page_id, from_id)`, creating
/// one from `seed` if absent. Returns the conversation and whether it was
/// newly created.
pub async fn find_or_create_message_conversation(
    db: &Database,
    seed: NewConversation,
) -> Result<(Conversation, bool), SyncError> {
    db.connection()
        .call(move |conn| {
            let existing = conn
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                         WHERE page_id = ?1 AND from_id = ?2 AND kind = 'message' LIMIT 1"
                    ),
                    params![seed.page_id, seed.from_id],
                    row_to_conversation,
                )
                .optional()?;
            match existing {
                Some(conversation) => Ok((conversation, false)),
                None => Ok((insert_conversation(conn, &seed)?, true)),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Find the open comment conversation for `(page_id, from_id, post_id)`,
/// creating one from `seed` if absent.
pub async fn find_or_create_comment_conversation(
    db: &Database,
    seed: NewConversation,
) -> Result<(Conversation, bool), SyncError> {
    db.connection()
        .call(move |conn| {
            let existing = conn
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                         WHERE page_id = ?1 AND from_id = ?2 AND post_id = ?3 \
                         AND kind = 'comment' LIMIT 1"
                    ),
                    params![seed.page_id, seed.from_id, seed.post_id],
                    row_to_conversation,
                )
                .optional()?;
            match existing {
                Some(conversation) => Ok((conversation, false)),
                None => Ok((insert_conversation(conn, &seed)?, true)),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a conversation by local id.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, SyncError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                    params![id],
                    row_to_conversation,
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Look up the message conversation for a counterpart, without creating.
/// Used by delivery/read receipts, which never open conversations.
pub async fn find_message_conversation(
    db: &Database,
    page_id: &str,
    from_id: &str,
) -> Result<Option<Conversation>, SyncError> {
    let page_id = page_id.to_string();
    let from_id = from_id.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {CONVERSATION_COLUMNS} FROM conversations \
                         WHERE page_id = ?1 AND from_id = ?2 AND kind = 'message' LIMIT 1"
                    ),
                    params![page_id, from_id],
                    row_to_conversation,
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply one state transition if the change's timestamp is at least the
/// row's current `updated_time`.
///
/// Returns the (re-read) conversation and whether the transition applied.
/// A `false` result means the unit did not qualify: an older backfilled
/// unit arrived after newer state was already displayed.
pub async fn apply_state_change(
    db: &Database,
    conversation_id: &str,
    change: StateChange,
) -> Result<(Conversation, bool), SyncError> {
    let id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let affected = if change.from_page {
                conn.execute(
                    "UPDATE conversations SET snippet = ?1, updated_time = ?2, \
                     unread_count = 0, replied = 1, seen = 1 \
                     WHERE id = ?3 AND updated_time <= ?2",
                    params![change.snippet, change.updated_time, id],
                )?
            } else {
                conn.execute(
                    "UPDATE conversations SET snippet = ?1, updated_time = ?2, \
                     unread_count = unread_count + ?3, replied = 0, seen = 0, \
                     last_user_message_at = ?4 \
                     WHERE id = ?5 AND updated_time <= ?2",
                    params![
                        change.snippet,
                        change.updated_time,
                        change.increment,
                        change.last_user_message_at,
                        id
                    ],
                )?
            };
            let conversation = conn.query_row(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )?;
            Ok((conversation, affected > 0))
        })
        .await
        .map_err(map_tr_err)
}

/// Advance the read watermark (message conversations only). The watermark
/// is monotonic; an older receipt never moves it backwards. Unread/replied
/// state is deliberately untouched.
pub async fn set_read_watermark(
    db: &Database,
    conversation_id: &str,
    watermark: i64,
) -> Result<(), SyncError> {
    let id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations \
                 SET read_watermark = MAX(COALESCE(read_watermark, 0), ?1) \
                 WHERE id = ?2 AND kind = 'message'",
                params![watermark, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
