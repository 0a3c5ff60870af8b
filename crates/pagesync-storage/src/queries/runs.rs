// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backfill run records. Counters are bumped after each fully-applied page
//! so an interrupted run leaves its partial progress visible.

use pagesync_core::SyncError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{BackfillRun, RunCounters};

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<BackfillRun> {
    Ok(BackfillRun {
        id: row.get(0)?,
        page_id: row.get(1)?,
        requester: row.get(2)?,
        counters: RunCounters {
            post_count: row.get(3)?,
            conversation_count: row.get(4)?,
            message_count: row.get(5)?,
            comment_count: row.get(6)?,
            end_at: row.get(8)?,
        },
        started_at: row.get(7)?,
    })
}

const RUN_COLUMNS: &str = "id, page_id, requester, post_count, conversation_count, \
     message_count, comment_count, started_at, end_at";

/// Create a new run record with zeroed counters.
pub async fn create_run(db: &Database, run: BackfillRun) -> Result<(), SyncError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO backfill_runs (id, page_id, requester, post_count, \
                 conversation_count, message_count, comment_count, started_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    run.id,
                    run.page_id,
                    run.requester,
                    run.counters.post_count,
                    run.counters.conversation_count,
                    run.counters.message_count,
                    run.counters.comment_count,
                    run.started_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Add a page's worth of counter deltas to the run.
pub async fn bump_counters(
    db: &Database,
    run_id: &str,
    delta: RunCounters,
) -> Result<(), SyncError> {
    let run_id = run_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE backfill_runs SET \
                 post_count = post_count + ?1, \
                 conversation_count = conversation_count + ?2, \
                 message_count = message_count + ?3, \
                 comment_count = comment_count + ?4 \
                 WHERE id = ?5",
                params![
                    delta.post_count,
                    delta.conversation_count,
                    delta.message_count,
                    delta.comment_count,
                    run_id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Stamp the run finished.
pub async fn finish_run(db: &Database, run_id: &str, end_at: i64) -> Result<(), SyncError> {
    let run_id = run_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE backfill_runs SET end_at = ?1 WHERE id = ?2",
                params![end_at, run_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a run by id.
pub async fn get_run(db: &Database, run_id: &str) -> Result<Option<BackfillRun>, SyncError> {
    let run_id = run_id.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {RUN_COLUMNS} FROM backfill_runs WHERE id = ?1"),
                    params![run_id],
                    row_to_run,
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}
