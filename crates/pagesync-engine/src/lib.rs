// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation engine tying remote page activity to local state.
//!
//! Both real-time webhooks and historical backfill funnel into one
//! resolve → ingest → update pipeline, so replays and overlapping
//! deliveries converge on identical conversation state.

pub mod backfill;
pub mod ingest;
pub mod pipeline;
pub mod reply;
pub mod resolver;
pub mod state;
pub mod unit;
pub mod webhook;

pub use backfill::BackfillWalker;
pub use pipeline::{Pipeline, UnitOutcome};
pub use webhook::{WebhookDispatcher, WebhookEnvelope};
