//! User management and own-profile endpoints

use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use yamdb_common::db::models::User;
use yamdb_common::db::users::{self, NewUser, UserPatch};
use yamdb_common::permissions::Policy;

use super::extract::{JsonBody, PathParams, QueryParams};
use super::{route_slashed, Caller};
use crate::pagination::{calculate_pagination, Page};
use crate::{ApiError, ApiResult, AppState};

/// `?search=&page=` on list endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
}

/// GET /api/v1/users/
pub async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<Json<Page<User>>> {
    caller.authorize(Policy::AdminOnly, &Method::GET, None)?;

    let search = query.search.as_deref();
    let total = users::count_users(&state.db, search).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), state.page_size());
    let results = users::list_users(&state.db, search, pagination.page_size, pagination.offset).await?;

    Ok(Json(Page::new(results, total, pagination)))
}

/// POST /api/v1/users/
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(input): JsonBody<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    caller.authorize(Policy::AdminOnly, &Method::POST, None)?;
    let user = users::create_user(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/{username}/
pub async fn get_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParams(username): PathParams<String>,
) -> ApiResult<Json<User>> {
    caller.authorize(Policy::AdminOnly, &Method::GET, None)?;
    Ok(Json(users::get_by_username(&state.db, &username).await?))
}

/// PATCH /api/v1/users/{username}/
pub async fn update_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParams(username): PathParams<String>,
    JsonBody(patch): JsonBody<UserPatch>,
) -> ApiResult<Json<User>> {
    caller.authorize(Policy::AdminOnly, &Method::PATCH, None)?;
    let user = users::get_by_username(&state.db, &username).await?;
    Ok(Json(users::update_user(&state.db, &user, patch).await?))
}

/// DELETE /api/v1/users/{username}/
pub async fn delete_user(
    State(state): State<AppState>,
    caller: Caller,
    PathParams(username): PathParams<String>,
) -> ApiResult<StatusCode> {
    caller.authorize(Policy::AdminOnly, &Method::DELETE, None)?;
    let user = users::get_by_username(&state.db, &username).await?;
    users::delete_user(&state.db, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn current_user(state: &AppState, caller: &Caller) -> ApiResult<User> {
    let requester = caller.require()?;
    users::find_by_id(&state.db, requester.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))
}

/// GET /api/v1/users/me/
pub async fn get_me(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<User>> {
    caller.authorize(Policy::Authenticated, &Method::GET, None)?;
    Ok(Json(current_user(&state, &caller).await?))
}

/// PATCH /api/v1/users/me/
///
/// The role field is ignored: nobody promotes themselves.
pub async fn update_me(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(mut patch): JsonBody<UserPatch>,
) -> ApiResult<Json<User>> {
    caller.authorize(Policy::Authenticated, &Method::PATCH, None)?;
    let user = current_user(&state, &caller).await?;
    patch.role = None;
    Ok(Json(users::update_user(&state.db, &user, patch).await?))
}

pub fn user_routes() -> Router<AppState> {
    let router = Router::new();
    let router = route_slashed(router, "/users", get(list_users).post(create_user));
    let router = route_slashed(router, "/users/me", get(get_me).patch(update_me));
    route_slashed(
        router,
        "/users/:username",
        get(get_user).patch(update_user).delete(delete_user),
    )
}
