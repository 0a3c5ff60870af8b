// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the remote graph API.
//!
//! Provides [`GraphClient`] which handles request construction, token
//! injection, bounded timeouts, cursor-linked pagination, and the two-kind
//! error split: a structured remote business error maps to
//! [`SyncError::RemoteApi`], everything else to [`SyncError::Transport`]
//! (or [`SyncError::Timeout`] for deadline overruns).

use std::time::Duration;

use pagesync_core::SyncError;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{
    CommentData, GraphErrorBody, IdResponse, Paged, PostData, SendMessageResponse,
    ChatMessageData, ThreadData,
};

const POST_FIELDS: &str =
    "id,message,created_time,attachments{type,media_type,target,subattachments}";
const COMMENT_FIELDS: &str = "id,message,from,created_time,parent,attachment,comment_count";
const CHAT_MESSAGE_FIELDS: &str = "id,message,from,to,created_time,attachments";
const THREAD_FIELDS: &str = "id,updated_time";

/// Client for the remote graph API.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    access_token: String,
    timeout: Duration,
}

impl GraphClient {
    /// Creates a new graph API client.
    ///
    /// `base_url` has no trailing slash (e.g. `https://graph.facebook.com`);
    /// tests point it at a wiremock server.
    pub fn new(
        base_url: &str,
        api_version: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            access_token: access_token.to_string(),
            timeout,
        })
    }

    fn edge_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.api_version, path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SyncError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout {
                    duration: self.timeout,
                }
            } else {
                SyncError::Transport {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                }
            }
        })?;

        let status = response.status();
        debug!(status = %status, "graph response received");

        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| SyncError::Decode(format!("bad response body: {e}")));
        }

        // Failed request: split into remote business error vs transport.
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<GraphErrorBody>(&body) {
            Ok(parsed) => {
                warn!(
                    code = parsed.error.code,
                    subcode = parsed.error.error_subcode.unwrap_or(0),
                    kind = parsed.error.kind.as_deref().unwrap_or(""),
                    "remote API returned structured error"
                );
                Err(SyncError::RemoteApi {
                    code: parsed.error.code,
                    subcode: parsed.error.error_subcode.unwrap_or(0),
                    message: parsed.error.message,
                })
            }
            Err(_) => Err(SyncError::Transport {
                message: format!("API returned {status}: {body}"),
                source: None,
            }),
        }
    }

    /// GET one page of a cursor-linked edge, e.g. `page-1/feed`.
    pub async fn get_edge<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: &str,
    ) -> Result<Paged<T>, SyncError> {
        let request = self
            .client
            .get(self.edge_url(path))
            .query(&[("fields", fields), ("access_token", &self.access_token)]);
        self.execute(request).await
    }

    /// Follow a `paging.next` link verbatim; the cursor URL already carries
    /// the token and field selection.
    pub async fn get_next<T: DeserializeOwned>(
        &self,
        next_url: &str,
    ) -> Result<Paged<T>, SyncError> {
        self.execute(self.client.get(next_url)).await
    }

    /// GET a single object by id.
    pub async fn get_object<T: DeserializeOwned>(
        &self,
        id: &str,
        fields: &str,
    ) -> Result<T, SyncError> {
        let request = self
            .client
            .get(self.edge_url(id))
            .query(&[("fields", fields), ("access_token", &self.access_token)]);
        self.execute(request).await
    }

    /// First page of the page's feed posts.
    pub async fn page_feed(&self, page_id: &str) -> Result<Paged<PostData>, SyncError> {
        self.get_edge(&format!("{page_id}/feed"), POST_FIELDS).await
    }

    /// First page of comments hanging off any object (post, photo target,
    /// or a comment's own replies).
    pub async fn object_comments(&self, object_id: &str) -> Result<Paged<CommentData>, SyncError> {
        self.get_edge(&format!("{object_id}/comments"), COMMENT_FIELDS)
            .await
    }

    /// First page of the page's chat threads.
    pub async fn page_conversations(&self, page_id: &str) -> Result<Paged<ThreadData>, SyncError> {
        self.get_edge(&format!("{page_id}/conversations"), THREAD_FIELDS)
            .await
    }

    /// First page of one chat thread's messages.
    pub async fn thread_messages(
        &self,
        thread_id: &str,
    ) -> Result<Paged<ChatMessageData>, SyncError> {
        self.get_edge(&format!("{thread_id}/messages"), CHAT_MESSAGE_FIELDS)
            .await
    }

    /// POST a chat reply to a recipient.
    pub async fn send_chat_message(
        &self,
        recipient_id: &str,
        text: &str,
    ) -> Result<SendMessageResponse, SyncError> {
        let body = serde_json::json!({
            "recipient": {"id": recipient_id},
            "message": {"text": text},
        });
        let request = self
            .client
            .post(self.edge_url("me/messages"))
            .query(&[("access_token", &self.access_token)])
            .json(&body);
        self.execute(request).await
    }

    /// POST a comment reply under an object (comment or post).
    pub async fn send_comment(&self, object_id: &str, text: &str) -> Result<IdResponse, SyncError> {
        let body = serde_json::json!({ "message": text });
        let request = self
            .client
            .post(self.edge_url(&format!("{object_id}/comments")))
            .query(&[("access_token", &self.access_token)])
            .json(&body);
        self.execute(request).await
    }
}
