use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::accounts::{self, AccountRef};
use crate::db::models::{NewTrip, Trip, TripType, TripUpdate};
use crate::db::trips;
use crate::error::{AppError, AppResult};
use crate::extractors::JsonBody;
use crate::query::TRIP_QUERY;
use crate::rating;
use crate::state::AppState;
use crate::votes::{self, Direction, VoteTarget};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterBody {
    pub account_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingBody {
    pub account_id: Option<String>,
    pub rating: Option<f64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route(
            "/trips/{id}",
            get(get_trip).put(update_trip).delete(delete_trip),
        )
        .route("/trips/{id}/likes", post(like_trip))
        .route("/trips/{id}/dislikes", post(dislike_trip))
        .route("/trips/{id}/rating", post(rate_trip))
        .route("/trips/outdoor/one", get(list_outdoor))
        .route("/trips/attractions/two", get(list_attractions))
        .route("/trips/foodie/three", get(list_foodie))
}

/// Account named in a request body.
fn acting_account(
    conn: &rusqlite::Connection,
    account_id: Option<String>,
) -> AppResult<AccountRef> {
    let account_id = account_id
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Invalid user id".into()))?;
    accounts::find_ref(conn, &account_id)
}

async fn list_trips(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<Trip>>> {
    let query = TRIP_QUERY.build(&params);
    let conn = state.db.get()?;
    Ok(Json(trips::list_trips(&conn, &query)?))
}

/// Trip listing pinned to one category. Other query keys still apply.
fn list_by_type(
    state: &AppState,
    mut params: HashMap<String, String>,
    trip_type: TripType,
) -> AppResult<Json<Vec<Trip>>> {
    params.insert("type".into(), i64::from(trip_type).to_string());
    let query = TRIP_QUERY.build(&params);
    let conn = state.db.get()?;
    Ok(Json(trips::list_trips(&conn, &query)?))
}

async fn list_outdoor(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<Trip>>> {
    list_by_type(&state, params, TripType::Outdoor)
}

async fn list_attractions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<Trip>>> {
    list_by_type(&state, params, TripType::Attractions)
}

async fn list_foodie(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<Trip>>> {
    list_by_type(&state, params, TripType::Foodie)
}

async fn create_trip(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewTrip>,
) -> AppResult<(StatusCode, Json<Trip>)> {
    let mut conn = state.db.get()?;
    let trip = trips::create_trip(&mut conn, new)?;
    Ok((StatusCode::CREATED, Json(trip)))
}

async fn get_trip(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Trip>> {
    let conn = state.db.get()?;
    Ok(Json(trips::get_trip(&conn, &id)?))
}

async fn update_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<TripUpdate>,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get()?;
    trips::update_trip(&mut conn, &id, update)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_trip(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    trips::delete_trip(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn vote_on_trip(
    state: &AppState,
    id: &str,
    body: VoterBody,
    direction: Direction,
) -> AppResult<StatusCode> {
    let mut conn = state.db.get()?;
    let actor = acting_account(&conn, body.account_id)?;
    votes::apply_vote(&mut conn, VoteTarget::Trip, id, &actor, direction)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn like_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<VoterBody>,
) -> AppResult<StatusCode> {
    vote_on_trip(&state, &id, body, Direction::Like)
}

async fn dislike_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<VoterBody>,
) -> AppResult<StatusCode> {
    vote_on_trip(&state, &id, body, Direction::Dislike)
}

async fn rate_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<RatingBody>,
) -> AppResult<StatusCode> {
    let value = body
        .rating
        .ok_or_else(|| AppError::BadRequest("rating is required".into()))?;
    let mut conn = state.db.get()?;
    let actor = acting_account(&conn, body.account_id)?;
    let summary = rating::submit_rating(&mut conn, &id, &actor, value)?;
    tracing::debug!(trip_id = %id, num_ratings = summary.num_ratings, "Trip rated");
    Ok(StatusCode::NO_CONTENT)
}
