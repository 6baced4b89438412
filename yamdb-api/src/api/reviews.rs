//! Review endpoints
//!
//! Any authenticated user may review a title once; the author, moderators
//! and admins may edit or delete the review.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use yamdb_common::db::models::Review;
use yamdb_common::db::reviews::{self, ReviewInput};
use yamdb_common::db::titles;
use yamdb_common::permissions::Policy;

use super::extract::{JsonBody, PathParams, QueryParams};
use super::{route_slashed, Caller};
use crate::pagination::{calculate_pagination, Page};
use crate::{ApiError, ApiResult, AppState};

const POLICY: Policy = Policy::AuthorOrStaffOrReadOnly;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// GET /api/v1/titles/{title_id}/reviews/
pub async fn list_reviews(
    State(state): State<AppState>,
    PathParams(title_id): PathParams<i64>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Json<Page<Review>>> {
    if !titles::exists(&state.db, title_id).await? {
        return Err(ApiError::NotFound(format!("Title {} does not exist", title_id)));
    }

    let total = reviews::count(&state.db, title_id).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), state.page_size());
    let results = reviews::list(&state.db, title_id, pagination.page_size, pagination.offset).await?;

    Ok(Json(Page::new(results, total, pagination)))
}

/// POST /api/v1/titles/{title_id}/reviews/
pub async fn create_review(
    State(state): State<AppState>,
    caller: Caller,
    PathParams(title_id): PathParams<i64>,
    JsonBody(input): JsonBody<ReviewInput>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    caller.authorize(POLICY, &Method::POST, None)?;
    let author = caller.require()?;
    let review = reviews::create(&state.db, title_id, author.id, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn get_review(
    State(state): State<AppState>,
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
) -> ApiResult<Json<Review>> {
    Ok(Json(reviews::get(&state.db, title_id, review_id).await?))
}

/// PATCH /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn update_review(
    State(state): State<AppState>,
    caller: Caller,
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    JsonBody(input): JsonBody<ReviewInput>,
) -> ApiResult<Json<Review>> {
    caller.authorize(POLICY, &Method::PATCH, None)?;
    let review = reviews::get(&state.db, title_id, review_id).await?;
    caller.authorize(POLICY, &Method::PATCH, Some(review.author_id))?;

    Ok(Json(reviews::update(&state.db, &review, input).await?))
}

/// DELETE /api/v1/titles/{title_id}/reviews/{review_id}/
pub async fn delete_review(
    State(state): State<AppState>,
    caller: Caller,
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
) -> ApiResult<StatusCode> {
    caller.authorize(POLICY, &Method::DELETE, None)?;
    let review = reviews::get(&state.db, title_id, review_id).await?;
    caller.authorize(POLICY, &Method::DELETE, Some(review.author_id))?;

    reviews::delete(&state.db, &review).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn review_routes() -> Router<AppState> {
    let router = Router::new();
    let router = route_slashed(
        router,
        "/titles/:title_id/reviews",
        get(list_reviews).post(create_review),
    );
    route_slashed(
        router,
        "/titles/:title_id/reviews/:review_id",
        get(get_review).patch(update_review).delete(delete_review),
    )
}
