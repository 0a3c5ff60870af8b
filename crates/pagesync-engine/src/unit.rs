// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion of decoded graph payloads into pipeline units.
//!
//! A unit missing its required actor is a data-integrity anomaly: callers
//! skip the unit with a warning rather than aborting the run.

use pagesync_core::{ConversationKind, IncomingUnit, SyncError};
use pagesync_graph::types::{parse_graph_time, ChatMessageData, CommentData};

/// Longest snippet stored on a conversation.
const SNIPPET_MAX_CHARS: usize = 120;

/// Short preview text for a conversation, cut on a char boundary.
pub fn snippet_of(body: &str) -> String {
    if body.chars().count() <= SNIPPET_MAX_CHARS {
        body.to_string()
    } else {
        body.chars().take(SNIPPET_MAX_CHARS).collect()
    }
}

/// Build a pipeline unit from a backfilled chat message.
pub fn unit_from_chat_message(
    page_id: &str,
    msg: &ChatMessageData,
) -> Result<IncomingUnit, SyncError> {
    let from = msg
        .from
        .as_ref()
        .ok_or_else(|| SyncError::Decode(format!("chat message {} has no sender", msg.id)))?;
    let from_page = from.id == page_id;
    let counterpart_id = if from_page {
        msg.to
            .as_ref()
            .and_then(|to| to.data.first())
            .map(|actor| actor.id.clone())
            .ok_or_else(|| {
                SyncError::Decode(format!("page-authored message {} has no recipient", msg.id))
            })?
    } else {
        from.id.clone()
    };

    let attachments = msg.attachments.as_ref().map(|a| &a.data);
    let has_attachments = attachments.is_some_and(|a| !a.is_empty());
    let attachment_kind = attachments
        .and_then(|a| a.first())
        .and_then(|a| a.mime_type.clone());
    let attachment_targets = attachments
        .map(|a| a.iter().filter_map(|att| att.id.clone()).collect())
        .unwrap_or_default();

    Ok(IncomingUnit {
        kind: ConversationKind::Message,
        external_id: msg.id.clone(),
        page_id: page_id.to_string(),
        from_id: from.id.clone(),
        counterpart_id,
        post_id: None,
        parent_external_id: None,
        body: msg.message.clone(),
        created_time: parse_graph_time(&msg.created_time)?,
        from_page,
        has_attachments,
        attachment_kind,
        attachment_targets,
        sent: from_page,
        delivered: from_page,
    })
}

/// Build a pipeline unit from a backfilled comment hanging off `object_id`
/// (the post itself, or a photo target for multi-photo posts).
pub fn unit_from_comment(
    page_id: &str,
    object_id: &str,
    comment: &CommentData,
) -> Result<IncomingUnit, SyncError> {
    let from = comment
        .from
        .as_ref()
        .ok_or_else(|| SyncError::Decode(format!("comment {} has no author", comment.id)))?;
    let from_page = from.id == page_id;
    let attachment = comment.attachment.as_ref();

    Ok(IncomingUnit {
        kind: ConversationKind::Comment,
        external_id: comment.id.clone(),
        page_id: page_id.to_string(),
        from_id: from.id.clone(),
        counterpart_id: from.id.clone(),
        post_id: Some(object_id.to_string()),
        parent_external_id: comment.parent.as_ref().map(|p| p.id.clone()),
        body: comment.message.clone(),
        created_time: parse_graph_time(&comment.created_time)?,
        from_page,
        has_attachments: attachment.is_some(),
        attachment_kind: attachment.and_then(|a| a.kind.clone()),
        attachment_targets: attachment
            .and_then(|a| a.target.as_ref())
            .map(|t| vec![t.id.clone()])
            .unwrap_or_default(),
        sent: from_page,
        delivered: from_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_json(from: &str, to: &str) -> ChatMessageData {
        serde_json::from_value(serde_json::json!({
            "id": "mid.1",
            "message": "hello there",
            "from": {"id": from},
            "to": {"data": [{"id": to}]},
            "created_time": "2015-10-08T13:34:28+0000"
        }))
        .unwrap()
    }

    #[test]
    fn external_chat_message_keeps_sender_as_counterpart() {
        let unit = unit_from_chat_message("page-1", &chat_json("user-1", "page-1")).unwrap();
        assert!(!unit.from_page);
        assert_eq!(unit.counterpart_id, "user-1");
        assert_eq!(unit.created_time, 1444311268000);
        assert!(!unit.sent);
    }

    #[test]
    fn page_chat_message_uses_recipient_as_counterpart() {
        let unit = unit_from_chat_message("page-1", &chat_json("page-1", "user-1")).unwrap();
        assert!(unit.from_page);
        assert_eq!(unit.counterpart_id, "user-1");
        assert!(unit.sent);
    }

    #[test]
    fn comment_without_author_is_an_anomaly() {
        let comment: CommentData = serde_json::from_value(serde_json::json!({
            "id": "post-1_c1",
            "message": "anonymous",
            "created_time": "2015-10-08T13:34:28+0000"
        }))
        .unwrap();
        assert!(matches!(
            unit_from_comment("page-1", "post-1", &comment),
            Err(SyncError::Decode(_))
        ));
    }

    #[test]
    fn comment_carries_parent_and_attachment_target() {
        let comment: CommentData = serde_json::from_value(serde_json::json!({
            "id": "post-1_c2",
            "message": "reply with photo",
            "from": {"id": "user-2"},
            "created_time": "2015-10-08T13:34:28+0000",
            "parent": {"id": "post-1_c1"},
            "attachment": {"type": "photo", "target": {"id": "photo-9"}}
        }))
        .unwrap();
        let unit = unit_from_comment("page-1", "post-1", &comment).unwrap();
        assert_eq!(unit.parent_external_id.as_deref(), Some("post-1_c1"));
        assert_eq!(unit.attachment_targets, vec!["photo-9"]);
        assert_eq!(unit.attachment_kind.as_deref(), Some("photo"));
        assert_eq!(unit.post_id.as_deref(), Some("post-1"));
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        assert_eq!(snippet_of("short"), "short");
        let long = "é".repeat(200);
        let snippet = snippet_of(&long);
        assert_eq!(snippet.chars().count(), 120);
    }
}
