// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time webhook dispatch.
//!
//! Envelope entries carry either `messaging` events (chat sends, echoes,
//! delivery and read receipts) or `changes` events (feed comment add, edit,
//! remove). Messaging timestamps are already epoch milliseconds; comment
//! `created_time` arrives in epoch seconds and is widened here.

use pagesync_core::{ConversationKind, IncomingUnit, SyncError, SyncEvent};
use pagesync_storage::queries::{conversations, messages};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::pipeline::Pipeline;

/// Top-level webhook envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// One page's batch of events.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    /// The page id.
    pub id: String,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
    #[serde(default)]
    pub changes: Vec<ChangeEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    pub sender: ActorId,
    pub recipient: ActorId,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<MessageEvent>,
    #[serde(default)]
    pub delivery: Option<ReceiptEvent>,
    #[serde(default)]
    pub read: Option<ReceiptEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorId {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageEvent {
    pub mid: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub attachments: Vec<MessageAttachment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageAttachment {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
}

/// Delivery or read receipt; the watermark is epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptEvent {
    pub watermark: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEvent {
    pub field: String,
    pub value: CommentChange,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentChange {
    #[serde(default)]
    pub item: Option<String>,
    pub verb: String,
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub from: Option<ActorId>,
    #[serde(default)]
    pub message: Option<String>,
    /// Epoch seconds.
    #[serde(default)]
    pub created_time: Option<i64>,
}

pub struct WebhookDispatcher {
    pipeline: Pipeline,
}

impl WebhookDispatcher {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Process every entry of an envelope. Unknown event shapes are logged
    /// and skipped; a storage failure aborts the batch.
    pub async fn dispatch(&self, envelope: &WebhookEnvelope) -> Result<(), SyncError> {
        for entry in &envelope.entry {
            for event in &entry.messaging {
                self.handle_messaging(&entry.id, event).await?;
            }
            for change in &entry.changes {
                self.handle_change(&entry.id, change).await?;
            }
        }
        Ok(())
    }

    async fn handle_messaging(
        &self,
        page_id: &str,
        event: &MessagingEvent,
    ) -> Result<(), SyncError> {
        if let Some(message) = &event.message {
            return self.handle_chat_message(page_id, event, message).await;
        }
        if let Some(delivery) = &event.delivery {
            return self
                .handle_delivery(page_id, &event.sender.id, delivery.watermark)
                .await;
        }
        if let Some(read) = &event.read {
            return self
                .handle_read(page_id, &event.sender.id, read.watermark)
                .await;
        }
        debug!(page_id, "ignoring messaging event with no known payload");
        Ok(())
    }

    async fn handle_chat_message(
        &self,
        page_id: &str,
        event: &MessagingEvent,
        message: &MessageEvent,
    ) -> Result<(), SyncError> {
        // An echo reports a page-authored send; the sender field still
        // names the page when the send came from another surface.
        let from_page = message.is_echo || event.sender.id == page_id;
        let counterpart_id = if from_page {
            event.recipient.id.clone()
        } else {
            event.sender.id.clone()
        };
        let created_time = event.timestamp.ok_or_else(|| {
            SyncError::Decode(format!("message event {} has no timestamp", message.mid))
        })?;

        let unit = IncomingUnit {
            kind: ConversationKind::Message,
            external_id: message.mid.clone(),
            page_id: page_id.to_string(),
            from_id: if from_page {
                page_id.to_string()
            } else {
                event.sender.id.clone()
            },
            counterpart_id,
            post_id: None,
            parent_external_id: None,
            body: message.text.clone().unwrap_or_default(),
            created_time,
            from_page,
            has_attachments: !message.attachments.is_empty(),
            attachment_kind: message.attachments.first().and_then(|a| a.kind.clone()),
            attachment_targets: message
                .attachments
                .iter()
                .filter_map(|a| a.payload.as_ref().and_then(|p| p.url.clone()))
                .collect(),
            sent: from_page,
            delivered: false,
        };

        let outcome = self.pipeline.process_unit(&unit).await?;
        if from_page && !outcome.message_created {
            // The echo confirms a send this service issued itself.
            messages::mark_sent(self.pipeline.db(), page_id, &message.mid).await?;
        }
        Ok(())
    }

    async fn handle_delivery(
        &self,
        page_id: &str,
        counterpart_id: &str,
        watermark: i64,
    ) -> Result<(), SyncError> {
        let Some(conversation) =
            conversations::find_message_conversation(self.pipeline.db(), page_id, counterpart_id)
                .await?
        else {
            debug!(page_id, counterpart_id, "delivery receipt for unknown conversation");
            return Ok(());
        };
        let updated =
            messages::mark_delivered_up_to(self.pipeline.db(), &conversation.id, watermark)
                .await?;
        debug!(
            conversation_id = conversation.id,
            watermark, updated, "delivery receipt applied"
        );
        Ok(())
    }

    async fn handle_read(
        &self,
        page_id: &str,
        counterpart_id: &str,
        watermark: i64,
    ) -> Result<(), SyncError> {
        let Some(conversation) =
            conversations::find_message_conversation(self.pipeline.db(), page_id, counterpart_id)
                .await?
        else {
            debug!(page_id, counterpart_id, "read receipt for unknown conversation");
            return Ok(());
        };
        conversations::set_read_watermark(self.pipeline.db(), &conversation.id, watermark).await
    }

    async fn handle_change(&self, page_id: &str, change: &ChangeEvent) -> Result<(), SyncError> {
        if change.field != "feed" || change.value.item.as_deref() != Some("comment") {
            debug!(page_id, field = change.field, "ignoring non-comment change");
            return Ok(());
        }
        match change.value.verb.as_str() {
            "add" => self.handle_comment_add(page_id, &change.value).await,
            "edited" | "edit" => self.handle_comment_edit(page_id, &change.value).await,
            "remove" | "delete" => self.handle_comment_remove(page_id, &change.value).await,
            other => {
                debug!(page_id, verb = other, "ignoring unknown comment verb");
                Ok(())
            }
        }
    }

    async fn handle_comment_add(
        &self,
        page_id: &str,
        change: &CommentChange,
    ) -> Result<(), SyncError> {
        let (Some(comment_id), Some(post_id), Some(from), Some(created_time)) = (
            change.comment_id.as_ref(),
            change.post_id.as_ref(),
            change.from.as_ref(),
            change.created_time,
        ) else {
            warn!(page_id, "skipping comment add with missing fields");
            return Ok(());
        };
        let from_page = from.id == page_id;
        let parent_external_id = change
            .parent_id
            .as_ref()
            .filter(|p| *p != post_id)
            .cloned();

        let unit = IncomingUnit {
            kind: ConversationKind::Comment,
            external_id: comment_id.clone(),
            page_id: page_id.to_string(),
            from_id: from.id.clone(),
            counterpart_id: from.id.clone(),
            post_id: Some(post_id.clone()),
            parent_external_id,
            body: change.message.clone().unwrap_or_default(),
            created_time: created_time * 1000,
            from_page,
            has_attachments: false,
            attachment_kind: None,
            attachment_targets: Vec::new(),
            sent: from_page,
            delivered: from_page,
        };
        self.pipeline.process_unit(&unit).await?;
        Ok(())
    }

    async fn handle_comment_edit(
        &self,
        page_id: &str,
        change: &CommentChange,
    ) -> Result<(), SyncError> {
        let Some(comment_id) = change.comment_id.as_ref() else {
            warn!(page_id, "skipping comment edit without comment id");
            return Ok(());
        };
        let body = change.message.clone().unwrap_or_default();
        let Some(updated) =
            messages::update_body(self.pipeline.db(), page_id, comment_id, &body).await?
        else {
            debug!(page_id, comment_id, "edit for unknown comment");
            return Ok(());
        };
        let Some(conversation) =
            conversations::get_conversation(self.pipeline.db(), &updated.conversation_id).await?
        else {
            return Ok(());
        };
        self.pipeline
            .emit(
                page_id,
                SyncEvent::CommentUpdated {
                    conversation_id: conversation.id.clone(),
                    conversation,
                    updated_message: updated,
                },
            )
            .await;
        Ok(())
    }

    async fn handle_comment_remove(
        &self,
        page_id: &str,
        change: &CommentChange,
    ) -> Result<(), SyncError> {
        let Some(comment_id) = change.comment_id.as_ref() else {
            warn!(page_id, "skipping comment removal without comment id");
            return Ok(());
        };
        let Some(deleted) =
            messages::mark_deleted(self.pipeline.db(), page_id, comment_id).await?
        else {
            debug!(page_id, comment_id, "removal for unknown comment");
            return Ok(());
        };
        self.pipeline
            .emit(
                page_id,
                SyncEvent::CommentDeleted {
                    deleted_message: deleted,
                },
            )
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{message_unit, setup_pipeline};

    fn chat_envelope(events: Vec<serde_json::Value>) -> WebhookEnvelope {
        serde_json::from_value(serde_json::json!({
            "object": "page",
            "entry": [{"id": "page-1", "time": 1000, "messaging": events}]
        }))
        .unwrap()
    }

    fn feed_envelope(value: serde_json::Value) -> WebhookEnvelope {
        serde_json::from_value(serde_json::json!({
            "object": "page",
            "entry": [{"id": "page-1", "time": 1000, "changes": [
                {"field": "feed", "value": value}
            ]}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn inbound_chat_message_opens_conversation() {
        let (pipeline, sink, _dir) = setup_pipeline().await;
        let dispatcher = WebhookDispatcher::new(pipeline.clone());

        dispatcher
            .dispatch(&chat_envelope(vec![serde_json::json!({
                "sender": {"id": "user-1"},
                "recipient": {"id": "page-1"},
                "timestamp": 100,
                "message": {"mid": "m1", "text": "hi"}
            })]))
            .await
            .unwrap();

        let conv = conversations::find_message_conversation(pipeline.db(), "page-1", "user-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conv.unread_count, 1);
        assert_eq!(conv.snippet, "hi");
        assert_eq!(sink.events().len(), 1);
        pipeline.db().clone().close().await.unwrap();
    }

    #[tokio::test]
    async fn echo_of_local_send_reconciles_instead_of_duplicating() {
        let (pipeline, _sink, _dir) = setup_pipeline().await;
        let dispatcher = WebhookDispatcher::new(pipeline.clone());

        // The service already stored its own outbound send as m9.
        let out = pipeline
            .process_unit(&message_unit("m9", "user-1", 100, true))
            .await
            .unwrap();

        dispatcher
            .dispatch(&chat_envelope(vec![serde_json::json!({
                "sender": {"id": "page-1"},
                "recipient": {"id": "user-1"},
                "timestamp": 100,
                "message": {"mid": "m9", "text": "body of m9", "is_echo": true}
            })]))
            .await
            .unwrap();

        let rows = messages::messages_for_conversation(pipeline.db(), &out.conversation.id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].sent);
        pipeline.db().clone().close().await.unwrap();
    }

    #[tokio::test]
    async fn late_echo_keeps_delivered_flag_from_receipt() {
        let (pipeline, _sink, _dir) = setup_pipeline().await;
        let dispatcher = WebhookDispatcher::new(pipeline.clone());

        let out = pipeline
            .process_unit(&message_unit("m9", "user-1", 100, true))
            .await
            .unwrap();

        // Delivery receipt lands first, then the echo for the same send.
        dispatcher
            .dispatch(&chat_envelope(vec![serde_json::json!({
                "sender": {"id": "user-1"},
                "recipient": {"id": "page-1"},
                "timestamp": 150,
                "delivery": {"watermark": 150}
            })]))
            .await
            .unwrap();
        dispatcher
            .dispatch(&chat_envelope(vec![serde_json::json!({
                "sender": {"id": "page-1"},
                "recipient": {"id": "user-1"},
                "timestamp": 100,
                "message": {"mid": "m9", "text": "body of m9", "is_echo": true}
            })]))
            .await
            .unwrap();

        let rows = messages::messages_for_conversation(pipeline.db(), &out.conversation.id)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].sent);
        assert!(rows[0].delivered, "echo after receipt must not reset delivery");
        pipeline.db().clone().close().await.unwrap();
    }

    #[tokio::test]
    async fn delivery_receipt_marks_sent_rows_up_to_watermark() {
        let (pipeline, _sink, _dir) = setup_pipeline().await;
        let dispatcher = WebhookDispatcher::new(pipeline.clone());

        pipeline
            .process_unit(&message_unit("m1", "user-1", 100, true))
            .await
            .unwrap();
        let out = pipeline
            .process_unit(&message_unit("m2", "user-1", 200, true))
            .await
            .unwrap();

        dispatcher
            .dispatch(&chat_envelope(vec![serde_json::json!({
                "sender": {"id": "user-1"},
                "recipient": {"id": "page-1"},
                "timestamp": 150,
                "delivery": {"watermark": 150}
            })]))
            .await
            .unwrap();

        let rows = messages::messages_for_conversation(pipeline.db(), &out.conversation.id)
            .await
            .unwrap();
        let m1 = rows.iter().find(|m| m.external_id == "m1").unwrap();
        let m2 = rows.iter().find(|m| m.external_id == "m2").unwrap();
        assert!(m1.delivered);
        assert!(!m2.delivered);
        pipeline.db().clone().close().await.unwrap();
    }

    #[tokio::test]
    async fn read_receipt_moves_watermark_monotonically() {
        let (pipeline, _sink, _dir) = setup_pipeline().await;
        let dispatcher = WebhookDispatcher::new(pipeline.clone());

        let out = pipeline
            .process_unit(&message_unit("m1", "user-1", 100, false))
            .await
            .unwrap();

        let receipt = |watermark: i64| {
            chat_envelope(vec![serde_json::json!({
                "sender": {"id": "user-1"},
                "recipient": {"id": "page-1"},
                "timestamp": watermark,
                "read": {"watermark": watermark}
            })])
        };
        dispatcher.dispatch(&receipt(500)).await.unwrap();
        dispatcher.dispatch(&receipt(300)).await.unwrap();

        let conv = conversations::get_conversation(pipeline.db(), &out.conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conv.read_watermark, Some(500));
        pipeline.db().clone().close().await.unwrap();
    }

    #[tokio::test]
    async fn comment_add_edit_remove_lifecycle() {
        let (pipeline, sink, _dir) = setup_pipeline().await;
        let dispatcher = WebhookDispatcher::new(pipeline.clone());

        dispatcher
            .dispatch(&feed_envelope(serde_json::json!({
                "item": "comment", "verb": "add",
                "comment_id": "post-1_c1", "post_id": "post-1",
                "from": {"id": "user-1"}, "message": "first",
                "created_time": 1444311268
            })))
            .await
            .unwrap();

        let stored = messages::find_by_external_id(pipeline.db(), "page-1", "post-1_c1")
            .await
            .unwrap()
            .unwrap();
        // Seconds widened to milliseconds.
        assert_eq!(stored.created_time, 1444311268000);

        dispatcher
            .dispatch(&feed_envelope(serde_json::json!({
                "item": "comment", "verb": "edited",
                "comment_id": "post-1_c1", "post_id": "post-1",
                "message": "first, edited"
            })))
            .await
            .unwrap();
        let edited = messages::find_by_external_id(pipeline.db(), "page-1", "post-1_c1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(edited.body, "first, edited");

        dispatcher
            .dispatch(&feed_envelope(serde_json::json!({
                "item": "comment", "verb": "remove",
                "comment_id": "post-1_c1", "post_id": "post-1"
            })))
            .await
            .unwrap();
        let removed = messages::find_by_external_id(pipeline.db(), "page-1", "post-1_c1")
            .await
            .unwrap()
            .unwrap();
        assert!(removed.deleted);

        let kinds: Vec<&'static str> = sink
            .events()
            .iter()
            .map(|(_, e)| match e {
                SyncEvent::ConversationUpdated { .. } => "updated",
                SyncEvent::CommentUpdated { .. } => "comment-updated",
                SyncEvent::CommentDeleted { .. } => "comment-deleted",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["updated", "comment-updated", "comment-deleted"]);
        pipeline.db().clone().close().await.unwrap();
    }

    #[tokio::test]
    async fn malformed_comment_add_is_skipped_not_fatal() {
        let (pipeline, sink, _dir) = setup_pipeline().await;
        let dispatcher = WebhookDispatcher::new(pipeline.clone());

        dispatcher
            .dispatch(&feed_envelope(serde_json::json!({
                "item": "comment", "verb": "add",
                "comment_id": "post-1_c1"
            })))
            .await
            .unwrap();
        assert!(sink.events().is_empty());
        pipeline.db().clone().close().await.unwrap();
    }
}
