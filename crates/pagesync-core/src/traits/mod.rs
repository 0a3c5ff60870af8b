// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the reconciliation engine and its collaborators.

pub mod cache;
pub mod events;

pub use cache::LookupCache;
pub use events::EventSink;
