// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cursor-chain walker over the remote page history.
//!
//! Two walks share one run record: the feed walk (posts, their comment
//! threads, photo-target threads, one level of replies) and the
//! conversation walk (chat threads and their messages). Counters persist
//! after every fully-applied top-level page, so an interrupted run leaves
//! its partial progress visible, and progress events report running totals
//! at the same cadence.

use std::sync::Arc;

use chrono::Utc;
use pagesync_core::{IncomingUnit, RunCounters, SyncError, SyncEvent};
use pagesync_graph::types::{CommentData, PostData};
use pagesync_graph::GraphClient;
use pagesync_storage::models::BackfillRun;
use pagesync_storage::queries::runs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::Pipeline;
use crate::unit::{unit_from_chat_message, unit_from_comment};

pub struct BackfillWalker {
    client: Arc<GraphClient>,
    pipeline: Pipeline,
    run: BackfillRun,
}

impl BackfillWalker {
    /// Create a fresh run record with zeroed counters.
    ///
    /// When `requester` is set, progress events are emitted after each
    /// applied page; a run kicked off by a schedule passes `None` and
    /// stays silent until the terminal notification.
    pub async fn start(
        client: Arc<GraphClient>,
        pipeline: Pipeline,
        page_id: &str,
        requester: Option<&str>,
    ) -> Result<Self, SyncError> {
        let run = BackfillRun {
            id: Uuid::new_v4().to_string(),
            page_id: page_id.to_string(),
            requester: requester.map(str::to_string),
            counters: RunCounters::default(),
            started_at: Utc::now().timestamp_millis(),
        };
        runs::create_run(pipeline.db(), run.clone()).await?;
        info!(run_id = run.id, page_id, "backfill run started");
        Ok(Self {
            client,
            pipeline,
            run,
        })
    }

    pub fn run(&self) -> &BackfillRun {
        &self.run
    }

    /// Walk the page feed: every post, its comment thread, the comment
    /// threads of photo targets, and one level of comment replies.
    pub async fn walk_feed(&mut self) -> Result<(), SyncError> {
        let mut page = self.client.page_feed(&self.run.page_id).await?;
        loop {
            let mut delta = RunCounters::default();
            for post in &page.data {
                delta.post_count += 1;
                self.walk_object_comments(&post.id, &mut delta).await?;
                for target_id in photo_targets(post) {
                    self.walk_object_comments(&target_id, &mut delta).await?;
                }
            }
            self.advance(delta).await?;
            match page.next() {
                Some(url) => page = self.client.get_next(url).await?,
                None => break,
            }
        }
        Ok(())
    }

    /// Walk the page's chat threads and every message inside them.
    pub async fn walk_conversations(&mut self) -> Result<(), SyncError> {
        let mut threads = self.client.page_conversations(&self.run.page_id).await?;
        loop {
            let mut delta = RunCounters::default();
            for thread in &threads.data {
                delta.conversation_count += 1;
                self.walk_thread_messages(&thread.id, &mut delta).await?;
            }
            self.advance(delta).await?;
            match threads.next() {
                Some(url) => threads = self.client.get_next(url).await?,
                None => break,
            }
        }
        Ok(())
    }

    /// Stamp the run finished and emit the terminal notification.
    pub async fn finish(mut self) -> Result<BackfillRun, SyncError> {
        let end_at = Utc::now().timestamp_millis();
        runs::finish_run(self.pipeline.db(), &self.run.id, end_at).await?;
        self.run.counters.end_at = Some(end_at);
        info!(
            run_id = self.run.id,
            posts = self.run.counters.post_count,
            conversations = self.run.counters.conversation_count,
            messages = self.run.counters.message_count,
            comments = self.run.counters.comment_count,
            "backfill run finished"
        );
        self.pipeline
            .emit(
                &self.run.page_id,
                SyncEvent::Finished {
                    status: "finished".to_string(),
                    page_id: self.run.page_id.clone(),
                },
            )
            .await;
        Ok(self.run)
    }

    async fn walk_thread_messages(
        &self,
        thread_id: &str,
        delta: &mut RunCounters,
    ) -> Result<(), SyncError> {
        let mut page = self.client.thread_messages(thread_id).await?;
        loop {
            let mut units = Vec::with_capacity(page.data.len());
            for msg in &page.data {
                match unit_from_chat_message(&self.run.page_id, msg) {
                    Ok(unit) => units.push(unit),
                    Err(e) => warn!(message_id = msg.id, error = %e, "skipping malformed chat message"),
                }
            }
            self.apply_units(units, delta, false).await?;
            match page.next() {
                Some(url) => page = self.client.get_next(url).await?,
                None => break,
            }
        }
        Ok(())
    }

    async fn walk_object_comments(
        &self,
        object_id: &str,
        delta: &mut RunCounters,
    ) -> Result<(), SyncError> {
        let mut page = self.client.object_comments(object_id).await?;
        loop {
            self.apply_comment_page(object_id, None, &page.data, delta)
                .await?;
            // One level of nesting: replies hang off the comment they
            // answer, never deeper.
            for comment in &page.data {
                if comment.comment_count.unwrap_or(0) > 0 {
                    self.walk_comment_replies(object_id, &comment.id, delta)
                        .await?;
                }
            }
            match page.next() {
                Some(url) => page = self.client.get_next(url).await?,
                None => break,
            }
        }
        Ok(())
    }

    async fn walk_comment_replies(
        &self,
        object_id: &str,
        parent_id: &str,
        delta: &mut RunCounters,
    ) -> Result<(), SyncError> {
        let mut page = self.client.object_comments(parent_id).await?;
        loop {
            self.apply_comment_page(object_id, Some(parent_id), &page.data, delta)
                .await?;
            match page.next() {
                Some(url) => page = self.client.get_next(url).await?,
                None => break,
            }
        }
        Ok(())
    }

    async fn apply_comment_page(
        &self,
        object_id: &str,
        parent_id: Option<&str>,
        comments: &[CommentData],
        delta: &mut RunCounters,
    ) -> Result<(), SyncError> {
        let mut units = Vec::with_capacity(comments.len());
        for comment in comments {
            match unit_from_comment(&self.run.page_id, object_id, comment) {
                Ok(mut unit) => {
                    // Reply listings may omit the parent reference.
                    if unit.parent_external_id.is_none() {
                        unit.parent_external_id = parent_id.map(str::to_string);
                    }
                    units.push(unit);
                }
                Err(e) => warn!(comment_id = comment.id, error = %e, "skipping malformed comment"),
            }
        }
        self.apply_units(units, delta, true).await
    }

    /// Feed a page's units through the pipeline oldest-first. Listings
    /// arrive newest-first; sorting keeps per-conversation presentation
    /// order non-decreasing within the page.
    async fn apply_units(
        &self,
        mut units: Vec<IncomingUnit>,
        delta: &mut RunCounters,
        count_conversations: bool,
    ) -> Result<(), SyncError> {
        units.sort_by_key(|u| u.created_time);
        for unit in &units {
            let outcome = self.pipeline.process_unit(unit).await?;
            match unit.kind {
                pagesync_core::ConversationKind::Message => delta.message_count += 1,
                pagesync_core::ConversationKind::Comment => delta.comment_count += 1,
            }
            if count_conversations && outcome.conversation_created {
                delta.conversation_count += 1;
            }
        }
        Ok(())
    }

    /// Fold a page's deltas into the run, persist them, and report
    /// running totals to the requester.
    async fn advance(&mut self, delta: RunCounters) -> Result<(), SyncError> {
        self.run.counters.add(&delta);
        runs::bump_counters(self.pipeline.db(), &self.run.id, delta).await?;
        if self.run.requester.is_none() {
            return Ok(());
        }
        let totals = [
            ("postCount", self.run.counters.post_count),
            ("conversationCount", self.run.counters.conversation_count),
            ("messageCount", self.run.counters.message_count),
            ("commentCount", self.run.counters.comment_count),
        ];
        for (counter_name, value) in totals {
            self.pipeline
                .emit(
                    &self.run.page_id,
                    SyncEvent::Progress {
                        counter_name: counter_name.to_string(),
                        value,
                    },
                )
                .await;
        }
        Ok(())
    }
}

fn photo_targets(post: &PostData) -> Vec<String> {
    let Some(attachments) = &post.attachments else {
        return Vec::new();
    };
    let mut targets = Vec::new();
    for attachment in &attachments.data {
        if let Some(subs) = &attachment.subattachments {
            for sub in &subs.data {
                if let Some(target) = &sub.target
                    && target.id != post.id
                {
                    targets.push(target.id.clone());
                }
            }
        } else if let Some(target) = &attachment.target
            && target.id != post.id
        {
            targets.push(target.id.clone());
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::setup_pipeline;
    use pagesync_core::SyncEvent;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> Arc<GraphClient> {
        Arc::new(
            GraphClient::new(&server.uri(), "v19.0", "test-token", Duration::from_secs(5))
                .unwrap(),
        )
    }

    fn comment(id: &str, from: &str, t: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "message": format!("body of {id}"),
            "from": {"id": from},
            "created_time": t
        })
    }

    #[tokio::test]
    async fn three_page_comment_chain_sums_counters_and_finishes_once() {
        let server = MockServer::start().await;
        let (pipeline, sink, _dir) = setup_pipeline().await;

        Mock::given(method("GET"))
            .and(path("/v19.0/page-1/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "post-1", "message": "a post"}]
            })))
            .mount(&server)
            .await;

        // Three comment pages chained by cursor, two comments each.
        Mock::given(method("GET"))
            .and(path("/v19.0/post-1/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    comment("post-1_c2", "user-1", "2015-10-08T13:34:29+0000"),
                    comment("post-1_c1", "user-1", "2015-10-08T13:34:28+0000"),
                ],
                "paging": {"next": format!("{}/chain?page=2", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chain"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    comment("post-1_c4", "user-2", "2015-10-08T13:34:31+0000"),
                    comment("post-1_c3", "user-2", "2015-10-08T13:34:30+0000"),
                ],
                "paging": {"next": format!("{}/chain?page=3", server.uri())}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chain"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    comment("post-1_c6", "user-3", "2015-10-08T13:34:33+0000"),
                    comment("post-1_c5", "user-3", "2015-10-08T13:34:32+0000"),
                ],
            })))
            .mount(&server)
            .await;

        let mut walker = BackfillWalker::start(
            client_for(&server),
            pipeline.clone(),
            "page-1",
            Some("client-9"),
        )
        .await
        .unwrap();
        walker.walk_feed().await.unwrap();
        let run = walker.finish().await.unwrap();

        assert_eq!(run.counters.post_count, 1);
        assert_eq!(run.counters.comment_count, 6);
        assert_eq!(run.counters.conversation_count, 3);
        assert!(run.counters.end_at.is_some());

        let stored = runs::get_run(pipeline.db(), &run.id).await.unwrap().unwrap();
        assert_eq!(stored.counters.comment_count, 6);
        assert_eq!(stored.counters.end_at, run.counters.end_at);

        let events = sink.events();
        let finished: Vec<_> = events
            .iter()
            .filter(|(_, e)| matches!(e, SyncEvent::Finished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);
        // Last commentCount progress report carries the final total.
        let last_comment_total = events
            .iter()
            .filter_map(|(_, e)| match e {
                SyncEvent::Progress {
                    counter_name,
                    value,
                } if counter_name == "commentCount" => Some(*value),
                _ => None,
            })
            .next_back()
            .unwrap();
        assert_eq!(last_comment_total, 6);
        pipeline.db().clone().close().await.unwrap();
    }

    #[tokio::test]
    async fn rerunning_a_finished_walk_creates_no_new_rows() {
        let server = MockServer::start().await;
        let (pipeline, _sink, _dir) = setup_pipeline().await;

        Mock::given(method("GET"))
            .and(path("/v19.0/page-1/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "post-1", "message": "a post"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v19.0/post-1/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [comment("post-1_c1", "user-1", "2015-10-08T13:34:28+0000")]
            })))
            .mount(&server)
            .await;

        for _ in 0..2 {
            let mut walker =
                BackfillWalker::start(client_for(&server), pipeline.clone(), "page-1", None)
                    .await
                    .unwrap();
            walker.walk_feed().await.unwrap();
            walker.finish().await.unwrap();
        }

        let stored = pagesync_storage::queries::messages::find_by_external_id(
            pipeline.db(),
            "page-1",
            "post-1_c1",
        )
        .await
        .unwrap()
        .unwrap();
        let rows = pagesync_storage::queries::messages::messages_for_conversation(
            pipeline.db(),
            &stored.conversation_id,
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        pipeline.db().clone().close().await.unwrap();
    }
}
