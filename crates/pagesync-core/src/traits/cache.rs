// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-through lookup cache seam.

use std::time::Duration;

/// Optional read-through cache in front of store lookups.
///
/// Never the system of record: every value has an explicit TTL and writers
/// must invalidate (or overwrite) on mutation. Lookups are expected to fall
/// back to the store on a miss, so any implementation may drop entries at
/// will. Values are serialized strings so implementations stay payload
/// agnostic.
pub trait LookupCache: Send + Sync {
    /// Fetch a live (non-expired) value.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value with an explicit time-to-live.
    fn put(&self, key: &str, value: String, ttl: Duration);

    /// Drop a key after the underlying row changed.
    fn invalidate(&self, key: &str);
}
