// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client crate for the remote graph API.
//!
//! Everything the rest of the workspace knows about the remote service
//! lives here: request construction, payload decoding into tagged types,
//! and the remote-vs-transport error split.

pub mod client;
pub mod types;

pub use client::GraphClient;
pub use types::{
    ActorRef, AttachmentData, ChatAttachment, ChatMessageData, CommentAttachment, CommentData,
    GraphErrorBody, GraphErrorDetail, IdResponse, Paged, Paging, ParentRef, PostData,
    SendMessageResponse, SubAttachment, TargetRef, ThreadData, parse_graph_time,
};
