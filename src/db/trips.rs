use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use crate::db::models::{NewTrip, Trip, TripType, TripUpdate};
use crate::db::pins::get_pins_in_order;
use crate::db::{new_id, now_timestamp};
use crate::error::{AppError, AppResult};
use crate::query::ListQuery;
use crate::votes::{self, VoteTarget};

const TRIP_COLUMNS: &str =
    "id, name, trip_type, likes, rating, num_ratings, linked_account, create_date";

fn row_to_trip(row: &Row<'_>) -> rusqlite::Result<Trip> {
    // An out-of-range stored type reads back as unset rather than failing the list
    let trip_type: Option<i64> = row.get(2)?;
    Ok(Trip {
        id: row.get(0)?,
        name: row.get(1)?,
        trip_type: trip_type.and_then(|t| TripType::try_from(t).ok()),
        pins: Vec::new(),
        likes: row.get(3)?,
        liked_by: Vec::new(),
        disliked_by: Vec::new(),
        rating: row.get(4)?,
        num_ratings: row.get(5)?,
        linked_account: row.get(6)?,
        create_date: row.get(7)?,
    })
}

fn pin_ids(conn: &Connection, trip_id: &str) -> AppResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT pin_id FROM trip_pins WHERE trip_id = ?1 ORDER BY position")?;
    let ids = stmt
        .query_map(params![trip_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

fn hydrate(conn: &Connection, mut trip: Trip) -> AppResult<Trip> {
    let ids = pin_ids(conn, &trip.id)?;
    trip.pins = get_pins_in_order(conn, &ids)?;
    let (liked_by, disliked_by) = votes::load_voters(conn, VoteTarget::Trip, &trip.id)?;
    trip.liked_by = liked_by;
    trip.disliked_by = disliked_by;
    Ok(trip)
}

pub fn list_trips(conn: &Connection, query: &ListQuery) -> AppResult<Vec<Trip>> {
    let (tail, values) = query.sql_tail();
    let mut stmt = conn.prepare(&format!("SELECT {TRIP_COLUMNS} FROM trips{tail}"))?;
    let trips = stmt
        .query_map(params_from_iter(values), row_to_trip)?
        .collect::<Result<Vec<_>, _>>()?;
    trips.into_iter().map(|t| hydrate(conn, t)).collect()
}

pub fn get_trip(conn: &Connection, id: &str) -> AppResult<Trip> {
    let trip = conn
        .query_row(
            &format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?1"),
            params![id],
            row_to_trip,
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Trip"))?;
    hydrate(conn, trip)
}

/// Replace the trip's ordered pin list. Every id must name an existing pin.
fn write_pins(tx: &Transaction<'_>, trip_id: &str, pins: &[String]) -> AppResult<()> {
    tx.execute("DELETE FROM trip_pins WHERE trip_id = ?1", params![trip_id])?;
    for (position, pin_id) in pins.iter().enumerate() {
        let exists = tx
            .query_row("SELECT 1 FROM pins WHERE id = ?1", params![pin_id], |_| {
                Ok(())
            })
            .optional()?
            .is_some();
        if !exists {
            return Err(AppError::BadRequest(format!("Unknown pin {}", pin_id)));
        }
        tx.execute(
            "INSERT INTO trip_pins (trip_id, position, pin_id) VALUES (?1, ?2, ?3)",
            params![trip_id, position as i64, pin_id],
        )?;
    }
    Ok(())
}

pub fn create_trip(conn: &mut Connection, new: NewTrip) -> AppResult<Trip> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Trip name is required".into()));
    }

    let id = new_id();
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO trips (id, name, trip_type, linked_account, create_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            name,
            new.trip_type.map(i64::from),
            new.linked_account,
            now_timestamp()
        ],
    )?;
    write_pins(&tx, &id, &new.pins)?;
    tx.commit()?;

    tracing::info!(trip_id = %id, pins = new.pins.len(), "Created trip");
    get_trip(conn, &id)
}

/// Votes, the `likes` counter and ratings are not writable here.
pub fn update_trip(conn: &mut Connection, id: &str, update: TripUpdate) -> AppResult<()> {
    if let Some(ref name) = update.name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Trip name cannot be empty".into()));
        }
    }

    let tx = conn.transaction()?;
    let rows = tx.execute(
        "UPDATE trips SET
           name = COALESCE(?1, name),
           trip_type = COALESCE(?2, trip_type),
           linked_account = COALESCE(?3, linked_account)
         WHERE id = ?4",
        params![
            update.name.as_deref().map(str::trim),
            update.trip_type.map(i64::from),
            update.linked_account,
            id
        ],
    )?;
    if rows == 0 {
        return Err(AppError::not_found("Trip"));
    }
    if let Some(pins) = update.pins {
        write_pins(&tx, id, &pins)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_trip(conn: &Connection, id: &str) -> AppResult<()> {
    let rows = conn.execute("DELETE FROM trips WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(AppError::not_found("Trip"));
    }
    tracing::info!(trip_id = %id, "Deleted trip");
    Ok(())
}
