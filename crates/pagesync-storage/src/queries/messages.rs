// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message row operations.
//!
//! `insert_message_if_absent` is the idempotency point: the lookup and
//! insert run inside one connection-thread closure against the UNIQUE
//! `(page_id, external_id)` index, so replaying a unit from an overlapping
//! webhook/backfill stream returns the original row untouched.

use pagesync_core::SyncError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::Message;
use crate::queries::parse_kind;

const MESSAGE_COLUMNS: &str = "id, conversation_id, kind, page_id, external_id, from_id, body, \
     created_time, has_attachments, attachment_kind, attachment_targets, sent, delivered, deleted";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let targets: Option<String> = row.get(10)?;
    let attachment_targets = match targets {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?,
        None => Vec::new(),
    };
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        kind: parse_kind(2, row.get(2)?)?,
        page_id: row.get(3)?,
        external_id: row.get(4)?,
        from_id: row.get(5)?,
        body: row.get(6)?,
        created_time: row.get(7)?,
        has_attachments: row.get(8)?,
        attachment_kind: row.get(9)?,
        attachment_targets,
        sent: row.get(11)?,
        delivered: row.get(12)?,
        deleted: row.get(13)?,
    })
}

fn select_by_external(
    conn: &rusqlite::Connection,
    page_id: &str,
    external_id: &str,
) -> rusqlite::Result<Option<Message>> {
    conn.query_row(
        &format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE page_id = ?1 AND external_id = ?2 LIMIT 1"
        ),
        params![page_id, external_id],
        row_to_message,
    )
    .optional()
}

/// Insert a message unless one already exists for `(page_id, external_id)`.
///
/// Returns the row and whether it already existed. An existing row is
/// returned completely unchanged: no update, no duplicate.
pub async fn insert_message_if_absent(
    db: &Database,
    msg: Message,
) -> Result<(Message, bool), SyncError> {
    let targets_json = if msg.attachment_targets.is_empty() {
        None
    } else {
        Some(
            serde_json::to_string(&msg.attachment_targets)
                .map_err(|e| SyncError::Internal(format!("attachment targets encode: {e}")))?,
        )
    };
    db.connection()
        .call(move |conn| {
            if let Some(existing) = select_by_external(conn, &msg.page_id, &msg.external_id)? {
                return Ok((existing, true));
            }
            conn.execute(
                "INSERT INTO messages (id, conversation_id, kind, page_id, external_id, \
                 from_id, body, created_time, has_attachments, attachment_kind, \
                 attachment_targets, sent, delivered, deleted) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.kind.to_string(),
                    msg.page_id,
                    msg.external_id,
                    msg.from_id,
                    msg.body,
                    msg.created_time,
                    msg.has_attachments,
                    msg.attachment_kind,
                    targets_json,
                    msg.sent,
                    msg.delivered,
                ],
            )?;
            Ok((msg, false))
        })
        .await
        .map_err(map_tr_err)
}

/// Look up a message by its remote id.
pub async fn find_by_external_id(
    db: &Database,
    page_id: &str,
    external_id: &str,
) -> Result<Option<Message>, SyncError> {
    let page_id = page_id.to_string();
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| select_by_external(conn, &page_id, &external_id).map_err(Into::into))
        .await
        .map_err(map_tr_err)
}

/// Replace a message's body text (comment edits). Conversation state is
/// deliberately not recomputed for edits.
pub async fn update_body(
    db: &Database,
    page_id: &str,
    external_id: &str,
    body: &str,
) -> Result<Option<Message>, SyncError> {
    let page_id = page_id.to_string();
    let external_id = external_id.to_string();
    let body = body.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET body = ?1 WHERE page_id = ?2 AND external_id = ?3",
                params![body, page_id, external_id],
            )?;
            select_by_external(conn, &page_id, &external_id).map_err(Into::into)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a message deleted (comment removals). The row stays for audit and
/// dedup; conversation state is not recomputed.
pub async fn mark_deleted(
    db: &Database,
    page_id: &str,
    external_id: &str,
) -> Result<Option<Message>, SyncError> {
    let page_id = page_id.to_string();
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET deleted = 1 WHERE page_id = ?1 AND external_id = ?2",
                params![page_id, external_id],
            )?;
            select_by_external(conn, &page_id, &external_id).map_err(Into::into)
        })
        .await
        .map_err(map_tr_err)
}

/// Confirm one message as sent (webhook echo reconciliation).
///
/// Leaves `delivered` alone: delivery receipts own that flag, and echoes
/// can arrive after the receipt for the same message.
pub async fn mark_sent(
    db: &Database,
    page_id: &str,
    external_id: &str,
) -> Result<Option<Message>, SyncError> {
    let page_id = page_id.to_string();
    let external_id = external_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE messages SET sent = 1 \
                 WHERE page_id = ?1 AND external_id = ?2",
                params![page_id, external_id],
            )?;
            select_by_external(conn, &page_id, &external_id).map_err(Into::into)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark every page-authored message up to the delivery watermark delivered.
pub async fn mark_delivered_up_to(
    db: &Database,
    conversation_id: &str,
    watermark: i64,
) -> Result<usize, SyncError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute(
                "UPDATE messages SET delivered = 1 \
                 WHERE conversation_id = ?1 AND created_time <= ?2 AND sent = 1",
                params![conversation_id, watermark],
            )?;
            Ok(n)
        })
        .await
        .map_err(map_tr_err)
}

/// Messages of one conversation in chronological order.
pub async fn messages_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, SyncError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages \
                 WHERE conversation_id = ?1 ORDER BY created_time ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], row_to_message)?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationKind, Message};
    use crate::queries::conversations::{find_or_create_message_conversation, NewConversation};
    use tempfile::tempdir;

    async fn setup_db_with_conversation() -> (Database, String, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        let (conv, _) = find_or_create_message_conversation(
            &db,
            NewConversation {
                id: "conv-1".to_string(),
                kind: ConversationKind::Message,
                page_id: "page-1".to_string(),
                post_id: None,
                root_comment_id: None,
                from_id: "user-1".to_string(),
                snippet: "hi".to_string(),
                created_time: 100,
                from_page: false,
            },
        )
        .await
        .unwrap();
        (db, conv.id, dir)
    }

    fn make_msg(id: &str, external_id: &str, created_time: i64) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "conv-1".to_string(),
            kind: ConversationKind::Message,
            page_id: "page-1".to_string(),
            external_id: external_id.to_string(),
            from_id: "user-1".to_string(),
            body: format!("body of {external_id}"),
            created_time,
            has_attachments: false,
            attachment_kind: None,
            attachment_targets: Vec::new(),
            sent: false,
            delivered: false,
            deleted: false,
        }
    }

    #[tokio::test]
    async fn duplicate_external_id_returns_original_row() {
        let (db, _conv, _dir) = setup_db_with_conversation().await;

        let (first, existed) = insert_message_if_absent(&db, make_msg("m1", "ext-1", 100))
            .await
            .unwrap();
        assert!(!existed);

        // Replay with a different local id and different body text.
        let mut replay = make_msg("m2", "ext-1", 100);
        replay.body = "changed".to_string();
        let (second, existed) = insert_message_if_absent(&db, replay).await.unwrap();
        assert!(existed);
        assert_eq!(second.id, first.id);
        assert_eq!(second.body, first.body);

        let all = messages_for_conversation(&db, "conv-1").await.unwrap();
        assert_eq!(all.len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn attachment_targets_round_trip() {
        let (db, _conv, _dir) = setup_db_with_conversation().await;
        let mut msg = make_msg("m1", "ext-1", 100);
        msg.has_attachments = true;
        msg.attachment_kind = Some("photo".to_string());
        msg.attachment_targets = vec!["t1".to_string(), "t2".to_string()];
        insert_message_if_absent(&db, msg).await.unwrap();

        let found = find_by_external_id(&db, "page-1", "ext-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.attachment_targets, vec!["t1", "t2"]);
        assert_eq!(found.attachment_kind.as_deref(), Some("photo"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn edit_and_remove_touch_only_the_row() {
        let (db, _conv, _dir) = setup_db_with_conversation().await;
        insert_message_if_absent(&db, make_msg("m1", "ext-1", 100))
            .await
            .unwrap();

        let edited = update_body(&db, "page-1", "ext-1", "edited text")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.body, "edited text");
        assert!(!edited.deleted);

        let removed = mark_deleted(&db, "page-1", "ext-1").await.unwrap().unwrap();
        assert!(removed.deleted);

        // Unknown external id is a no-op returning None.
        assert!(update_body(&db, "page-1", "nope", "x").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delivery_watermark_marks_sent_messages() {
        let (db, conv, _dir) = setup_db_with_conversation().await;
        let mut sent_msg = make_msg("m1", "ext-1", 100);
        sent_msg.sent = true;
        insert_message_if_absent(&db, sent_msg).await.unwrap();
        let mut late = make_msg("m2", "ext-2", 300);
        late.sent = true;
        insert_message_if_absent(&db, late).await.unwrap();

        let n = mark_delivered_up_to(&db, &conv, 200).await.unwrap();
        assert_eq!(n, 1);
        let rows = messages_for_conversation(&db, &conv).await.unwrap();
        assert!(rows[0].delivered);
        assert!(!rows[1].delivered);
        db.close().await.unwrap();
    }
}
