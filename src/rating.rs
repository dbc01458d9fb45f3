//! Running mean of trip ratings.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::accounts::AccountRef;
use crate::error::{AppError, AppResult};
use crate::feed;

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub rating: Option<f64>,
    pub num_ratings: i64,
}

impl RatingSummary {
    pub const EMPTY: RatingSummary = RatingSummary {
        rating: None,
        num_ratings: 0,
    };

    /// Fold one more rating into the mean.
    pub fn absorb(self, new_rating: f64) -> RatingSummary {
        match self.rating {
            Some(mean) if self.num_ratings > 0 => {
                let n = self.num_ratings as f64;
                RatingSummary {
                    rating: Some((mean * n + new_rating) / (n + 1.0)),
                    num_ratings: self.num_ratings + 1,
                }
            }
            _ => RatingSummary {
                rating: Some(new_rating),
                num_ratings: 1,
            },
        }
    }
}

pub fn validate_rating(rating: f64) -> AppResult<f64> {
    if rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(AppError::BadRequest(format!(
            "Rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )))
    }
}

/// Record `rating` from `actor` on a trip and tell the trip's owner.
///
/// The read of the current mean and the write of the new one happen under a
/// write lock, so concurrent submissions are serialized rather than lost.
pub fn submit_rating(
    conn: &mut Connection,
    trip_id: &str,
    actor: &AccountRef,
    rating: f64,
) -> AppResult<RatingSummary> {
    let rating = validate_rating(rating)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let (name, owner, current): (String, Option<String>, RatingSummary) = tx
        .query_row(
            "SELECT name, linked_account, rating, num_ratings FROM trips WHERE id = ?1",
            params![trip_id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    RatingSummary {
                        rating: row.get(2)?,
                        num_ratings: row.get(3)?,
                    },
                ))
            },
        )
        .optional()?
        .ok_or_else(|| AppError::not_found("Trip"))?;

    let updated = current.absorb(rating);
    tx.execute(
        "UPDATE trips SET rating = ?1, num_ratings = ?2 WHERE id = ?3",
        params![updated.rating, updated.num_ratings, trip_id],
    )?;
    tx.commit()?;

    let message = format!(
        "{} rated your trip {}, {}/5",
        actor.username, name, rating
    );
    feed::notify_owner(conn, owner.as_deref(), &message);

    Ok(updated)
}
