// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation resolution: which local conversation does a unit belong to.
//!
//! Rules, in order:
//! 1. chat messages group by `(page_id, counterpart, kind=message)`;
//! 2. top-level comments (no parent, or parent is the post itself) group by
//!    `(page_id, author, post_id)`;
//! 3. replies whose parent id shares the post's id prefix are part of the
//!    same post's thread and group exactly like rule 2;
//! 4. replies to an arbitrary other comment inherit the parent message's
//!    conversation; when the parent was never ingested (deep reply seen
//!    before its ancestor) a fresh conversation is opened per rule 2. Two
//!    conversations may then transiently represent one logical thread until
//!    ancestor backfill fills the gap; they are never re-merged.

use std::time::Duration;

use pagesync_core::{Conversation, ConversationKind, IncomingUnit, LookupCache, SyncError};
use pagesync_storage::queries::conversations::{
    find_or_create_comment_conversation, find_or_create_message_conversation, get_conversation,
    NewConversation,
};
use pagesync_storage::queries::messages::find_by_external_id;
use pagesync_storage::Database;
use tracing::debug;
use uuid::Uuid;

use crate::unit::snippet_of;

/// TTL for cached parent-comment lookups. Conversations never move between
/// ids, so a stale mapping can only come from cache capacity churn.
const PARENT_LOOKUP_TTL: Duration = Duration::from_secs(300);

fn parent_cache_key(page_id: &str, parent_external_id: &str) -> String {
    format!("parent-conv:{page_id}:{parent_external_id}")
}

fn seed_from(unit: &IncomingUnit, top_level_comment: bool) -> NewConversation {
    NewConversation {
        id: Uuid::new_v4().to_string(),
        kind: unit.kind,
        page_id: unit.page_id.clone(),
        post_id: match unit.kind {
            ConversationKind::Comment => unit.post_id.clone(),
            ConversationKind::Message => None,
        },
        root_comment_id: if top_level_comment {
            Some(unit.external_id.clone())
        } else {
            None
        },
        from_id: unit.counterpart_id.clone(),
        snippet: snippet_of(&unit.body),
        created_time: unit.created_time,
        from_page: unit.from_page,
    }
}

/// Whether a parent comment id belongs to the same post's comment thread.
/// Remote ids are `{object}_{suffix}`; a shared leading segment means the
/// parent hangs off the same post even under a different top-level root.
fn shares_post_prefix(parent_external_id: &str, post_id: &str) -> bool {
    let parent_prefix = parent_external_id.split('_').next();
    let post_prefix = post_id.split('_').next();
    matches!((parent_prefix, post_prefix), (Some(a), Some(b)) if a == b && !a.is_empty())
}

/// Resolve the conversation a unit belongs to, creating one if none
/// matches. Returns the conversation and whether it was newly created.
pub async fn resolve(
    db: &Database,
    cache: Option<&dyn LookupCache>,
    unit: &IncomingUnit,
) -> Result<(Conversation, bool), SyncError> {
    match unit.kind {
        ConversationKind::Message => {
            find_or_create_message_conversation(db, seed_from(unit, false)).await
        }
        ConversationKind::Comment => resolve_comment(db, cache, unit).await,
    }
}

async fn resolve_comment(
    db: &Database,
    cache: Option<&dyn LookupCache>,
    unit: &IncomingUnit,
) -> Result<(Conversation, bool), SyncError> {
    let post_id = unit
        .post_id
        .as_deref()
        .ok_or_else(|| SyncError::Decode(format!("comment {} has no post id", unit.external_id)))?;

    let parent = unit.parent_external_id.as_deref();
    // A comment is the thread root only when it has no parent (or the
    // parent is the post itself); a same-post-prefix reply still groups
    // by (page, author, post) but must not claim root status.
    let is_root = parent.is_none_or(|p| p == post_id);
    if is_root || parent.is_some_and(|p| shares_post_prefix(p, post_id)) {
        return find_or_create_comment_conversation(db, seed_from(unit, is_root)).await;
    }

    // Reply to an arbitrary comment: inherit the parent's conversation.
    let parent_external_id = parent.unwrap_or_default();
    if let Some((conversation, created)) =
        lookup_parent_conversation(db, cache, &unit.page_id, parent_external_id).await?
    {
        return Ok((conversation, created));
    }

    debug!(
        parent = parent_external_id,
        comment = unit.external_id,
        "parent comment never ingested; opening fallback conversation"
    );
    find_or_create_comment_conversation(db, seed_from(unit, false)).await
}

async fn lookup_parent_conversation(
    db: &Database,
    cache: Option<&dyn LookupCache>,
    page_id: &str,
    parent_external_id: &str,
) -> Result<Option<(Conversation, bool)>, SyncError> {
    let key = parent_cache_key(page_id, parent_external_id);

    if let Some(cache) = cache
        && let Some(conversation_id) = cache.get(&key)
        && let Some(conversation) = get_conversation(db, &conversation_id).await?
    {
        return Ok(Some((conversation, false)));
    }

    let Some(parent) = find_by_external_id(db, page_id, parent_external_id).await? else {
        return Ok(None);
    };
    let Some(conversation) = get_conversation(db, &parent.conversation_id).await? else {
        // Parent row points at a missing conversation; treat as unresolved.
        return Ok(None);
    };
    if let Some(cache) = cache {
        cache.put(&key, conversation.id.clone(), PARENT_LOOKUP_TTL);
    }
    Ok(Some((conversation, false)))
}
