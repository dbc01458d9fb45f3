//! Per-account activity feed: a short, most-recent-first list of messages
//! about votes, comments and ratings on the account's pins and trips.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{AppError, AppResult};

pub const FEED_CAPACITY: usize = 5;

/// Prepend `message` to the account's feed, dropping entries beyond
/// [`FEED_CAPACITY`]. Duplicate messages are kept.
///
/// The write lock is taken at BEGIN so concurrent pushes wait on the busy
/// timeout instead of failing the read-to-write upgrade.
pub fn push_feed(conn: &mut Connection, account_id: &str, message: &str) -> AppResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let exists = tx
        .query_row(
            "SELECT 1 FROM accounts WHERE id = ?1",
            params![account_id],
            |_| Ok(()),
        )
        .optional()?;
    if exists.is_none() {
        return Err(AppError::not_found("Account"));
    }

    tx.execute(
        "INSERT INTO feed_entries (account_id, message) VALUES (?1, ?2)",
        params![account_id, message],
    )?;
    tx.execute(
        "DELETE FROM feed_entries
         WHERE account_id = ?1
           AND id NOT IN (
             SELECT id FROM feed_entries WHERE account_id = ?1 ORDER BY id DESC LIMIT ?2
           )",
        params![account_id, FEED_CAPACITY as i64],
    )?;

    tx.commit()?;
    Ok(())
}

/// Most recent first.
pub fn load_feed(conn: &Connection, account_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT message FROM feed_entries WHERE account_id = ?1 ORDER BY id DESC LIMIT ?2",
    )?;
    let feed = stmt
        .query_map(params![account_id, FEED_CAPACITY as i64], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(feed)
}

/// Follow-up notification to a document owner. The primary write has already
/// committed, so failures are logged and reported back rather than propagated.
pub fn notify_owner(conn: &mut Connection, owner: Option<&str>, message: &str) -> bool {
    let Some(owner) = owner else {
        return false;
    };
    match push_feed(conn, owner, message) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(owner, "Failed to update feed: {}", e);
            false
        }
    }
}
