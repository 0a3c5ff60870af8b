// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tagged payload types for the remote graph API.
//!
//! The API's loosely-typed JSON is decoded into these structs immediately
//! at the client boundary; untyped maps never travel past this crate.

use pagesync_core::SyncError;
use serde::Deserialize;

/// One page of a cursor-linked list response.
#[derive(Debug, Clone, Deserialize)]
pub struct Paged<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl<T> Paged<T> {
    /// URL of the next page, if any.
    pub fn next(&self) -> Option<&str> {
        self.paging.as_ref().and_then(|p| p.next.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
}

/// Minimal actor reference (`from`, `to`, participants).
#[derive(Debug, Clone, Deserialize)]
pub struct ActorRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParentRef {
    pub id: String,
}

/// A post on the page feed.
#[derive(Debug, Clone, Deserialize)]
pub struct PostData {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub attachments: Option<Paged<AttachmentData>>,
}

/// A post attachment; multi-photo posts nest one sub-attachment per photo,
/// each with its own target object carrying its own comment thread.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentData {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub target: Option<TargetRef>,
    #[serde(default)]
    pub subattachments: Option<Paged<SubAttachment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubAttachment {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub target: Option<TargetRef>,
}

/// A comment or sub-comment on a post (or photo target).
#[derive(Debug, Clone, Deserialize)]
pub struct CommentData {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub from: Option<ActorRef>,
    pub created_time: String,
    #[serde(default)]
    pub parent: Option<ParentRef>,
    #[serde(default)]
    pub attachment: Option<CommentAttachment>,
    /// Number of direct replies; zero means no sub-comment walk is needed.
    #[serde(default)]
    pub comment_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentAttachment {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub target: Option<TargetRef>,
}

/// One chat thread from the conversations listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadData {
    pub id: String,
    #[serde(default)]
    pub updated_time: Option<String>,
}

/// One direct message inside a chat thread.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageData {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub from: Option<ActorRef>,
    #[serde(default)]
    pub to: Option<Paged<ActorRef>>,
    pub created_time: String,
    #[serde(default)]
    pub attachments: Option<Paged<ChatAttachment>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatAttachment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Response to a chat message send.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub message_id: String,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// Response to object creation (comment reply).
#[derive(Debug, Clone, Deserialize)]
pub struct IdResponse {
    pub id: String,
}

/// Structured error body returned by the remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorBody {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub error_subcode: Option<i64>,
}

/// Decode a remote `created_time` into epoch milliseconds.
///
/// The service emits `2015-10-08T13:34:28+0000`; RFC 3339 is accepted as a
/// fallback.
pub fn parse_graph_time(raw: &str) -> Result<i64, SyncError> {
    chrono::DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| SyncError::Decode(format!("bad created_time `{raw}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_graph_timestamp_format() {
        let ms = parse_graph_time("2015-10-08T13:34:28+0000").unwrap();
        assert_eq!(ms, 1444311268000);
    }

    #[test]
    fn parses_rfc3339_fallback() {
        let ms = parse_graph_time("2015-10-08T13:34:28+00:00").unwrap();
        assert_eq!(ms, 1444311268000);
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(matches!(
            parse_graph_time("yesterday"),
            Err(SyncError::Decode(_))
        ));
    }

    #[test]
    fn paged_decodes_with_and_without_paging() {
        let page: Paged<CommentData> = serde_json::from_str(
            r#"{
                "data": [{"id": "c1", "message": "hi", "created_time": "2015-10-08T13:34:28+0000"}],
                "paging": {"next": "https://example.test/next"}
            }"#,
        )
        .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.next(), Some("https://example.test/next"));

        let page: Paged<CommentData> = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.next(), None);
    }

    #[test]
    fn error_body_decodes_structured_fields() {
        let body: GraphErrorBody = serde_json::from_str(
            r#"{"error": {"message": "Permissions error", "type": "OAuthException",
                "code": 200, "error_subcode": 1357045}}"#,
        )
        .unwrap();
        assert_eq!(body.error.code, 200);
        assert_eq!(body.error.error_subcode, Some(1357045));
    }
}
