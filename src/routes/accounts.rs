use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::accounts;
use crate::db::models::{Account, AccountUpdate, NewAccount};
use crate::error::{AppError, AppResult};
use crate::extractors::{AuthUser, JsonBody};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedsBody {
    pub num_seeds: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinCountBody {
    pub num_pins: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyTripBody {
    pub trip_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/currentuser", get(current_user))
        .route(
            "/accounts/{id}",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/accounts/{id}/seeds", get(get_seeds).put(set_seeds))
        .route("/accounts/{id}/pins", get(get_pin_count).put(set_pin_count))
        .route("/accounts/{id}/mytrips", get(list_my_trips).post(add_my_trip))
        .route("/accounts/{id}/mytrips/{trip_id}", delete(remove_my_trip))
}

async fn list_accounts(State(state): State<AppState>) -> AppResult<Json<Vec<Account>>> {
    let conn = state.db.get()?;
    Ok(Json(accounts::list_accounts(&conn)?))
}

async fn create_account(
    State(state): State<AppState>,
    JsonBody(new): JsonBody<NewAccount>,
) -> AppResult<(StatusCode, Json<Account>)> {
    let conn = state.db.get()?;
    let account = accounts::create_account(&conn, new)?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn current_user(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<Account>> {
    let conn = state.db.get()?;
    Ok(Json(accounts::current_user(&conn, &claims)?))
}

async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Account>> {
    let conn = state.db.get()?;
    Ok(Json(accounts::get_account(&conn, &id)?))
}

async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<AccountUpdate>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    accounts::update_account(&conn, &id, update)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    accounts::delete_account(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_seeds(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<i64>> {
    let conn = state.db.get()?;
    Ok(Json(accounts::get_account(&conn, &id)?.num_seeds))
}

async fn set_seeds(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<SeedsBody>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    accounts::update_account(
        &conn,
        &id,
        AccountUpdate {
            num_seeds: Some(body.num_seeds),
            ..Default::default()
        },
    )?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_pin_count(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<i64>> {
    let conn = state.db.get()?;
    Ok(Json(accounts::get_account(&conn, &id)?.num_pins))
}

async fn set_pin_count(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<PinCountBody>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    accounts::update_account(
        &conn,
        &id,
        AccountUpdate {
            num_pins: Some(body.num_pins),
            ..Default::default()
        },
    )?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_my_trips(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    let conn = state.db.get()?;
    accounts::find_ref(&conn, &id)?;
    Ok(Json(accounts::list_my_trips(&conn, &id)?))
}

async fn add_my_trip(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<MyTripBody>,
) -> AppResult<StatusCode> {
    let trip_id = body
        .trip_id
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("tripId is required".into()))?;
    let conn = state.db.get()?;
    accounts::add_my_trip(&conn, &id, &trip_id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_my_trip(
    State(state): State<AppState>,
    Path((id, trip_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    accounts::remove_my_trip(&conn, &id, &trip_id)?;
    Ok(StatusCode::NO_CONTENT)
}
