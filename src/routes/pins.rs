use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::db::accounts::{self, AccountRef};
use crate::db::models::{NewPin, Pin, PinUpdate};
use crate::db::pins;
use crate::error::{AppError, AppResult};
use crate::extractors::{AuthUser, JsonBody};
use crate::feed;
use crate::query::PIN_QUERY;
use crate::state::AppState;
use crate::votes::{self, Direction, VoteTarget};

#[derive(Deserialize)]
pub struct VoteBody {
    #[serde(default)]
    pub dir: Value,
}

impl VoteBody {
    /// `dir` may arrive as a number or a numeric string; only its sign is used.
    pub fn direction(&self) -> AppResult<Direction> {
        let value = match &self.dir {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.trunc() as i64)
                })
            }
            _ => None,
        };
        value
            .map(Direction::from_signum)
            .ok_or_else(|| AppError::BadRequest("dir is not a number".into()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentBody {
    pub linked_account: Option<String>,
    #[serde(default)]
    pub text: String,
}

#[derive(Deserialize)]
pub struct EditCommentBody {
    #[serde(default)]
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pins", get(list_pins).post(create_pin))
        .route(
            "/pins/{id}",
            get(get_pin).put(update_pin).delete(delete_pin),
        )
        .route("/pins/{id}/votes/{user_id}", put(vote_on_pin))
        .route("/pins/{id}/comments", post(add_comment))
        .route(
            "/pins/{id}/comments/{account_id}",
            put(edit_comment).delete(remove_comments),
        )
}

async fn list_pins(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Vec<Pin>>> {
    let query = PIN_QUERY.build(&params);
    let conn = state.db.get()?;
    Ok(Json(pins::list_pins(&conn, &query)?))
}

async fn create_pin(
    State(state): State<AppState>,
    _user: AuthUser,
    JsonBody(new): JsonBody<NewPin>,
) -> AppResult<(StatusCode, Json<Pin>)> {
    let conn = state.db.get()?;
    let pin = pins::create_pin(&conn, new)?;
    Ok((StatusCode::CREATED, Json(pin)))
}

async fn get_pin(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Pin>> {
    let conn = state.db.get()?;
    Ok(Json(pins::get_pin(&conn, &id)?))
}

async fn update_pin(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<PinUpdate>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    pins::update_pin(&conn, &id, update)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_pin(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    pins::delete_pin(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// The voter is whoever the token names; the path must agree with it.
async fn vote_on_pin(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((id, user_id)): Path<(String, String)>,
    JsonBody(body): JsonBody<VoteBody>,
) -> AppResult<StatusCode> {
    let direction = body.direction()?;

    let mut conn = state.db.get()?;
    let actor = accounts::find_ref_by_subject(&conn, &claims.sub)?
        .ok_or_else(|| AppError::NotFound("User account not found".into()))?;
    if actor.id != user_id {
        return Err(AppError::BadRequest("Invalid user id".into()));
    }

    votes::apply_vote(&mut conn, VoteTarget::Pin, &id, &actor, direction)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_comment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<NewCommentBody>,
) -> AppResult<StatusCode> {
    let author_id = body
        .linked_account
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("linkedAccount is required".into()))?;

    let mut conn = state.db.get()?;
    let author: AccountRef = accounts::find_ref(&conn, &author_id)?;
    let (name, owner) = pins::add_comment(&conn, &id, &author, &body.text)?;

    let message = format!("{} commented on your pin {}", author.username, name);
    feed::notify_owner(&mut conn, owner.as_deref(), &message);
    Ok(StatusCode::NO_CONTENT)
}

async fn edit_comment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((id, account_id)): Path<(String, String)>,
    JsonBody(body): JsonBody<EditCommentBody>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    pins::edit_comment(&conn, &id, &account_id, &body.text)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_comments(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((id, account_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    let conn = state.db.get()?;
    let removed = pins::remove_comments(&conn, &id, &account_id)?;
    tracing::debug!(pin_id = %id, account_id = %account_id, removed, "Removed comments");
    Ok(StatusCode::NO_CONTENT)
}
