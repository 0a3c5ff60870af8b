// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound replies authored by the page.
//!
//! The remote send happens first; the acknowledged id is then fed back
//! through the normal pipeline so the local row exists before any echo
//! arrives and the echo reconciles instead of duplicating.

use chrono::Utc;
use pagesync_core::{Conversation, ConversationKind, IncomingUnit, Message, SyncError};
use pagesync_graph::GraphClient;
use tracing::info;

use crate::pipeline::Pipeline;

/// Send `text` into `conversation` and store the resulting message.
pub async fn send_reply(
    client: &GraphClient,
    pipeline: &Pipeline,
    conversation: &Conversation,
    text: &str,
) -> Result<Message, SyncError> {
    let external_id = match conversation.kind {
        ConversationKind::Message => {
            client
                .send_chat_message(&conversation.from_id, text)
                .await?
                .message_id
        }
        ConversationKind::Comment => {
            // Replying under the root comment keeps the thread flat; a
            // conversation without one (post-level) replies on the post.
            let target = conversation
                .root_comment_id
                .as_deref()
                .or(conversation.post_id.as_deref())
                .ok_or_else(|| {
                    SyncError::Internal(format!(
                        "comment conversation {} has no reply target",
                        conversation.id
                    ))
                })?;
            client.send_comment(target, text).await?.id
        }
    };
    info!(
        conversation_id = conversation.id,
        external_id, "reply acknowledged by remote"
    );

    let unit = IncomingUnit {
        kind: conversation.kind,
        external_id,
        page_id: conversation.page_id.clone(),
        from_id: conversation.page_id.clone(),
        counterpart_id: conversation.from_id.clone(),
        post_id: conversation.post_id.clone(),
        parent_external_id: conversation.root_comment_id.clone(),
        body: text.to_string(),
        created_time: Utc::now().timestamp_millis(),
        from_page: true,
        has_attachments: false,
        attachment_kind: None,
        attachment_targets: Vec::new(),
        sent: true,
        delivered: false,
    };
    let outcome = pipeline.process_unit(&unit).await?;
    Ok(outcome.message)
}
