use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::auth::Claims;
use crate::db::models::{Account, AccountUpdate, NewAccount};
use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::feed;

const ACCOUNT_COLUMNS: &str = "id, auth_subject, username, num_seeds, num_pins, create_date";

/// Just enough of an account to act on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub id: String,
    pub username: String,
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        auth_id: row.get(1)?,
        username: row.get(2)?,
        num_seeds: row.get(3)?,
        num_pins: row.get(4)?,
        my_trips: Vec::new(),
        feed: Vec::new(),
        create_date: row.get(5)?,
    })
}

fn hydrate(conn: &Connection, mut account: Account) -> AppResult<Account> {
    account.my_trips = list_my_trips(conn, &account.id)?;
    account.feed = feed::load_feed(conn, &account.id)?;
    Ok(account)
}

pub fn find_ref(conn: &Connection, id: &str) -> AppResult<AccountRef> {
    conn.query_row(
        "SELECT id, username FROM accounts WHERE id = ?1",
        params![id],
        |row| {
            Ok(AccountRef {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Account"))
}

pub fn find_ref_by_subject(conn: &Connection, subject: &str) -> AppResult<Option<AccountRef>> {
    Ok(conn
        .query_row(
            "SELECT id, username FROM accounts WHERE auth_subject = ?1",
            params![subject],
            |row| {
                Ok(AccountRef {
                    id: row.get(0)?,
                    username: row.get(1)?,
                })
            },
        )
        .optional()?)
}

pub fn list_accounts(conn: &Connection) -> AppResult<Vec<Account>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY rowid"
    ))?;
    let accounts = stmt
        .query_map([], row_to_account)?
        .collect::<Result<Vec<_>, _>>()?;
    accounts.into_iter().map(|a| hydrate(conn, a)).collect()
}

pub fn get_account(conn: &Connection, id: &str) -> AppResult<Account> {
    let account = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
            params![id],
            row_to_account,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Account"))?;
    hydrate(conn, account)
}

pub fn create_account(conn: &Connection, new: NewAccount) -> AppResult<Account> {
    let username = new.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username is required".into()));
    }

    let id = new_id();
    let inserted = conn.execute(
        "INSERT INTO accounts (id, auth_subject, username, create_date) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(auth_subject) DO NOTHING",
        params![id, new.auth_id, username, now_timestamp()],
    )?;
    if inserted == 0 {
        return Err(AppError::Conflict(
            "An account is already linked to that identity".into(),
        ));
    }

    tracing::info!(account_id = %id, "Created account");
    get_account(conn, &id)
}

/// Account linked to the token subject, created with zeroed counters on
/// first access.
pub fn current_user(conn: &Connection, claims: &Claims) -> AppResult<Account> {
    if let Some(existing) = find_ref_by_subject(conn, &claims.sub)? {
        return get_account(conn, &existing.id);
    }

    // Two first requests can race here; the unique subject keeps one row.
    conn.execute(
        "INSERT INTO accounts (id, auth_subject, username, create_date) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(auth_subject) DO NOTHING",
        params![new_id(), claims.sub, claims.display_name(), now_timestamp()],
    )?;
    let account = find_ref_by_subject(conn, &claims.sub)?
        .ok_or_else(|| AppError::Internal("account vanished after insert".into()))?;
    tracing::info!(account_id = %account.id, "Created account for new identity");
    get_account(conn, &account.id)
}

pub fn update_account(conn: &Connection, id: &str, update: AccountUpdate) -> AppResult<()> {
    if let Some(ref username) = update.username {
        if username.trim().is_empty() {
            return Err(AppError::BadRequest("Username cannot be empty".into()));
        }
    }

    let rows = conn.execute(
        "UPDATE accounts SET
           username = COALESCE(?1, username),
           num_seeds = COALESCE(?2, num_seeds),
           num_pins = COALESCE(?3, num_pins)
         WHERE id = ?4",
        params![
            update.username.as_deref().map(str::trim),
            update.num_seeds,
            update.num_pins,
            id
        ],
    )?;
    if rows == 0 {
        return Err(AppError::not_found("Account"));
    }
    Ok(())
}

/// Pins and trips the account owns are left in place.
pub fn delete_account(conn: &Connection, id: &str) -> AppResult<()> {
    let rows = conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(AppError::not_found("Account"));
    }
    tracing::info!(account_id = %id, "Deleted account");
    Ok(())
}

pub fn list_my_trips(conn: &Connection, account_id: &str) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT trip_id FROM account_trips WHERE account_id = ?1 ORDER BY rowid",
    )?;
    let trips = stmt
        .query_map(params![account_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(trips)
}

/// Set semantics: adding a trip twice is a no-op.
pub fn add_my_trip(conn: &Connection, account_id: &str, trip_id: &str) -> AppResult<()> {
    find_ref(conn, account_id)?;
    let trip_exists = conn
        .query_row("SELECT 1 FROM trips WHERE id = ?1", params![trip_id], |_| {
            Ok(())
        })
        .optional()?
        .is_some();
    if !trip_exists {
        return Err(AppError::not_found("Trip"));
    }

    conn.execute(
        "INSERT OR IGNORE INTO account_trips (account_id, trip_id) VALUES (?1, ?2)",
        params![account_id, trip_id],
    )?;
    Ok(())
}

pub fn remove_my_trip(conn: &Connection, account_id: &str, trip_id: &str) -> AppResult<()> {
    find_ref(conn, account_id)?;
    conn.execute(
        "DELETE FROM account_trips WHERE account_id = ?1 AND trip_id = ?2",
        params![account_id, trip_id],
    )?;
    Ok(())
}
