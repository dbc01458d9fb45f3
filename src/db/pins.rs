use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::accounts::AccountRef;
use crate::db::models::{Comment, Coordinate, NewPin, Pin, PinUpdate};
use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::query::ListQuery;
use crate::votes::{self, VoteTarget};

const PIN_COLUMNS: &str = "id, name, pin_type, rating, cost, description, image, review, \
     latitude, longitude, linked_account, likes, expire_at, create_date";

fn row_to_pin(row: &Row<'_>) -> rusqlite::Result<Pin> {
    let latitude: Option<f64> = row.get(8)?;
    let longitude: Option<f64> = row.get(9)?;
    Ok(Pin {
        id: row.get(0)?,
        name: row.get(1)?,
        pin_type: row.get(2)?,
        rating: row.get(3)?,
        cost: row.get(4)?,
        description: row.get(5)?,
        image: row.get(6)?,
        review: row.get(7)?,
        coordinate: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| Coordinate {
                latitude,
                longitude,
            }),
        linked_account: row.get(10)?,
        likes: row.get(11)?,
        liked_by: Vec::new(),
        disliked_by: Vec::new(),
        comments: Vec::new(),
        expire_at: row.get(12)?,
        create_date: row.get(13)?,
    })
}

fn hydrate(conn: &Connection, mut pin: Pin) -> AppResult<Pin> {
    let (liked_by, disliked_by) = votes::load_voters(conn, VoteTarget::Pin, &pin.id)?;
    pin.liked_by = liked_by;
    pin.disliked_by = disliked_by;
    pin.comments = load_comments(conn, &pin.id)?;
    Ok(pin)
}

fn load_comments(conn: &Connection, pin_id: &str) -> AppResult<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT account_id, text, create_date FROM pin_comments WHERE pin_id = ?1 ORDER BY id",
    )?;
    let comments = stmt
        .query_map(params![pin_id], |row| {
            Ok(Comment {
                linked_account: row.get(0)?,
                text: row.get(1)?,
                create_date: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub fn list_pins(conn: &Connection, query: &ListQuery) -> AppResult<Vec<Pin>> {
    let (tail, values) = query.sql_tail();
    let mut stmt = conn.prepare(&format!("SELECT {PIN_COLUMNS} FROM pins{tail}"))?;
    let pins = stmt
        .query_map(params_from_iter(values), row_to_pin)?
        .collect::<Result<Vec<_>, _>>()?;
    pins.into_iter().map(|p| hydrate(conn, p)).collect()
}

pub fn get_pin(conn: &Connection, id: &str) -> AppResult<Pin> {
    let pin = conn
        .query_row(
            &format!("SELECT {PIN_COLUMNS} FROM pins WHERE id = ?1"),
            params![id],
            row_to_pin,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Pin"))?;
    hydrate(conn, pin)
}

/// Pins referenced by a trip, in the given order. Unknown ids are skipped.
pub fn get_pins_in_order(conn: &Connection, ids: &[String]) -> AppResult<Vec<Pin>> {
    let mut pins = Vec::with_capacity(ids.len());
    for id in ids {
        match get_pin(conn, id) {
            Ok(pin) => pins.push(pin),
            Err(AppError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(pins)
}

pub fn create_pin(conn: &Connection, new: NewPin) -> AppResult<Pin> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Pin name is required".into()));
    }

    let id = new_id();
    let coordinate = new.coordinate;
    conn.execute(
        &format!(
            "INSERT INTO pins ({PIN_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?13)"
        ),
        params![
            id,
            name,
            new.pin_type,
            new.rating,
            new.cost.unwrap_or(0.0),
            new.description,
            new.image.unwrap_or_default(),
            new.review.unwrap_or_default(),
            coordinate.map(|c| c.latitude),
            coordinate.map(|c| c.longitude),
            new.linked_account,
            new.expire_at.map(|t| t.to_rfc3339()),
            now_timestamp(),
        ],
    )?;

    tracing::info!(pin_id = %id, "Created pin");
    get_pin(conn, &id)
}

/// Vote sets, the `likes` counter and comments have their own operations and
/// are not writable here.
pub fn update_pin(conn: &Connection, id: &str, update: PinUpdate) -> AppResult<()> {
    if let Some(ref name) = update.name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Pin name cannot be empty".into()));
        }
    }

    let coordinate = update.coordinate;
    let rows = conn.execute(
        "UPDATE pins SET
           name = COALESCE(?1, name),
           pin_type = COALESCE(?2, pin_type),
           rating = COALESCE(?3, rating),
           cost = COALESCE(?4, cost),
           description = COALESCE(?5, description),
           image = COALESCE(?6, image),
           review = COALESCE(?7, review),
           latitude = COALESCE(?8, latitude),
           longitude = COALESCE(?9, longitude),
           linked_account = COALESCE(?10, linked_account),
           expire_at = CASE WHEN ?11 THEN ?12 ELSE expire_at END
         WHERE id = ?13",
        params![
            update.name.as_deref().map(str::trim),
            update.pin_type,
            update.rating,
            update.cost,
            update.description,
            update.image,
            update.review,
            coordinate.map(|c| c.latitude),
            coordinate.map(|c| c.longitude),
            update.linked_account,
            update.expire_at.is_some(),
            update.expire_at.flatten().map(|t| t.to_rfc3339()),
            id,
        ],
    )?;
    if rows == 0 {
        return Err(AppError::not_found("Pin"));
    }
    Ok(())
}

pub fn delete_pin(conn: &Connection, id: &str) -> AppResult<()> {
    let rows = conn.execute("DELETE FROM pins WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(AppError::not_found("Pin"));
    }
    tracing::info!(pin_id = %id, "Deleted pin");
    Ok(())
}

/// Name and owner of the pin, for feed messages.
fn pin_header(conn: &Connection, pin_id: &str) -> AppResult<(String, Option<String>)> {
    conn.query_row(
        "SELECT name, linked_account FROM pins WHERE id = ?1",
        params![pin_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or_else(|| AppError::not_found("Pin"))
}

fn validate_comment(text: &str) -> AppResult<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Comment text is required".into()));
    }
    if text.len() > 2000 {
        return Err(AppError::BadRequest(
            "Comment must be 2000 characters or less".into(),
        ));
    }
    Ok(text)
}

/// Append a comment. Returns the pin's name and owner.
pub fn add_comment(
    conn: &Connection,
    pin_id: &str,
    author: &AccountRef,
    text: &str,
) -> AppResult<(String, Option<String>)> {
    let text = validate_comment(text)?;
    let header = pin_header(conn, pin_id)?;
    conn.execute(
        "INSERT INTO pin_comments (pin_id, account_id, text, create_date) VALUES (?1, ?2, ?3, ?4)",
        params![pin_id, author.id, text, now_timestamp()],
    )?;
    Ok(header)
}

/// Remove every comment `account_id` left on the pin. Returns how many went.
pub fn remove_comments(conn: &Connection, pin_id: &str, account_id: &str) -> AppResult<usize> {
    pin_header(conn, pin_id)?;
    let removed = conn.execute(
        "DELETE FROM pin_comments WHERE pin_id = ?1 AND account_id = ?2",
        params![pin_id, account_id],
    )?;
    Ok(removed)
}

/// Rewrite the account's first comment on the pin and restamp it.
pub fn edit_comment(conn: &Connection, pin_id: &str, account_id: &str, text: &str) -> AppResult<()> {
    let text = validate_comment(text)?;
    pin_header(conn, pin_id)?;
    let rows = conn.execute(
        "UPDATE pin_comments SET text = ?1, create_date = ?2
         WHERE id = (
           SELECT id FROM pin_comments WHERE pin_id = ?3 AND account_id = ?4 ORDER BY id LIMIT 1
         )",
        params![text, now_timestamp(), pin_id, account_id],
    )?;
    if rows == 0 {
        return Err(AppError::not_found("Comment"));
    }
    Ok(())
}
