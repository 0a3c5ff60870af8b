// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pagesync serve` and `pagesync backfill` command implementations.
//!
//! Serve binds the webhook endpoint and the operational API; backfill runs
//! a one-shot history walk and exits. Both share the same pipeline wiring:
//! SQLite storage, the graph client, an optional lookup cache, and an
//! event sink draining into the log.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pagesync_config::model::PagesyncConfig;
use pagesync_core::{EventSink, LookupCache, SyncError, SyncEvent, TtlCache};
use pagesync_engine::reply::send_reply;
use pagesync_engine::{BackfillWalker, Pipeline, WebhookDispatcher, WebhookEnvelope};
use pagesync_graph::GraphClient;
use pagesync_storage::queries::conversations;
use pagesync_storage::Database;
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

/// Sink that hands events to a background drain task through a bounded
/// channel; the deployment's delivery transport plugs in here.
struct ChannelSink {
    tx: mpsc::Sender<(String, SyncEvent)>,
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, page_id: &str, event: SyncEvent) -> Result<(), SyncError> {
        self.tx
            .send((page_id.to_string(), event))
            .await
            .map_err(|e| SyncError::Internal(format!("event channel closed: {e}")))
    }
}

/// Spawn the drain task and return the sink feeding it.
fn spawn_event_drain() -> Arc<dyn EventSink> {
    let (tx, mut rx) = mpsc::channel::<(String, SyncEvent)>(256);
    tokio::spawn(async move {
        while let Some((page_id, event)) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => info!(page_id, %payload, "event"),
                Err(e) => warn!(page_id, error = %e, "unserializable event"),
            }
        }
    });
    Arc::new(ChannelSink { tx })
}

async fn build_pipeline(config: &PagesyncConfig) -> Result<(Pipeline, Arc<GraphClient>), SyncError> {
    let db = Database::open_with(
        &config.storage.database_path,
        config.storage.busy_timeout_ms,
    )
    .await?;

    let client = Arc::new(GraphClient::new(
        &config.graph.base_url,
        &config.graph.api_version,
        &config.graph.access_token,
        Duration::from_secs(config.graph.timeout_secs),
    )?);

    let cache: Option<Arc<dyn LookupCache>> = if config.cache.enabled {
        let capacity = NonZeroUsize::new(config.cache.capacity).ok_or_else(|| {
            SyncError::Config("cache.capacity must be greater than zero".to_string())
        })?;
        Some(Arc::new(TtlCache::with_max_ttl(
            capacity,
            Duration::from_secs(config.cache.ttl_secs),
        )))
    } else {
        None
    };

    let pipeline = Pipeline::new(db, cache, spawn_event_drain());
    Ok((pipeline, client))
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    client: Arc<GraphClient>,
}

/// Runs the `pagesync serve` command.
pub async fn run_serve(config: PagesyncConfig) -> Result<(), SyncError> {
    init_tracing(&config.service.log_level);
    info!(service = config.service.name, "starting pagesync serve");

    let (pipeline, client) = build_pipeline(&config).await?;
    let state = AppState { pipeline, client };

    let app = Router::new()
        .route("/health", get(get_health))
        .route("/webhook", post(post_webhook))
        .route("/pages/{page_id}/backfill", post(post_backfill))
        .route("/conversations/{conversation_id}/reply", post(post_reply))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.webhook.host, config.webhook.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SyncError::Transport {
            message: format!("failed to bind webhook server to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("webhook server listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| SyncError::Transport {
            message: format!("webhook server error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Runs the `pagesync backfill` command: walk, report, exit.
pub async fn run_backfill(
    config: PagesyncConfig,
    page_id: &str,
    feed: bool,
    messages: bool,
) -> Result<(), SyncError> {
    init_tracing(&config.service.log_level);

    let (pipeline, client) = build_pipeline(&config).await?;
    let mut walker = BackfillWalker::start(client, pipeline, page_id, None).await?;
    if feed {
        walker.walk_feed().await?;
    }
    if messages {
        walker.walk_conversations().await?;
    }
    let run = walker.finish().await?;
    println!(
        "backfill {} finished: {} posts, {} conversations, {} messages, {} comments",
        run.id,
        run.counters.post_count,
        run.counters.conversation_count,
        run.counters.message_count,
        run.counters.comment_count,
    );
    Ok(())
}

async fn get_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn post_webhook(
    State(state): State<AppState>,
    Json(envelope): Json<WebhookEnvelope>,
) -> Response {
    let dispatcher = WebhookDispatcher::new(state.pipeline.clone());
    match dispatcher.dispatch(&envelope).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!(error = %e, "webhook dispatch failed");
            error_response(e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct BackfillRequest {
    #[serde(default = "default_true")]
    feed: bool,
    #[serde(default = "default_true")]
    messages: bool,
    #[serde(default)]
    requester: Option<String>,
}

fn default_true() -> bool {
    true
}

async fn post_backfill(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
    Json(request): Json<BackfillRequest>,
) -> Response {
    let walker = match BackfillWalker::start(
        state.client.clone(),
        state.pipeline.clone(),
        &page_id,
        request.requester.as_deref(),
    )
    .await
    {
        Ok(walker) => walker,
        Err(e) => {
            error!(page_id, error = %e, "failed to start backfill run");
            return error_response(e);
        }
    };
    let run_id = walker.run().id.clone();

    // The walk outlives the request; progress and the terminal event reach
    // the requester through the event sink.
    tokio::spawn(async move {
        let mut walker = walker;
        let walked = async {
            if request.feed {
                walker.walk_feed().await?;
            }
            if request.messages {
                walker.walk_conversations().await?;
            }
            Ok::<(), SyncError>(())
        }
        .await;
        match walked {
            Ok(()) => {
                if let Err(e) = walker.finish().await {
                    error!(error = %e, "failed to finish backfill run");
                }
            }
            Err(e) => error!(error = %e, "backfill walk aborted"),
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "runId": run_id })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct ReplyRequest {
    text: String,
}

async fn post_reply(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<ReplyRequest>,
) -> Response {
    let conversation =
        match conversations::get_conversation(state.pipeline.db(), &conversation_id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                return (
                    StatusCode::NOT_FOUND,
                    Json(serde_json::json!({ "error": "unknown conversation" })),
                )
                    .into_response();
            }
            Err(e) => return error_response(e),
        };

    match send_reply(&state.client, &state.pipeline, &conversation, &request.text).await {
        Ok(message) => (StatusCode::CREATED, Json(message)).into_response(),
        Err(e) => {
            error!(conversation_id, error = %e, "reply send failed");
            error_response(e)
        }
    }
}

/// Map pipeline failures onto HTTP statuses: remote business errors and
/// transport failures are the upstream's fault, decode failures are the
/// caller's, everything else is ours.
fn error_response(e: SyncError) -> Response {
    let status = match &e {
        SyncError::RemoteApi { .. } | SyncError::Transport { .. } | SyncError::Timeout { .. } => {
            StatusCode::BAD_GATEWAY
        }
        SyncError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = match &e {
        SyncError::RemoteApi { code, subcode, .. } => serde_json::json!({
            "error": e.to_string(),
            "code": code,
            "subcode": subcode,
        }),
        _ => serde_json::json!({ "error": e.to_string() }),
    };
    (status, Json(body)).into_response()
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pagesync={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
