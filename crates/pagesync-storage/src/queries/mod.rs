// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table.

pub mod conversations;
pub mod messages;
pub mod runs;

use rusqlite::types::Type;

use crate::models::ConversationKind;

/// Parse a stored `kind` column back into the enum.
pub(crate) fn parse_kind(idx: usize, raw: String) -> rusqlite::Result<ConversationKind> {
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
