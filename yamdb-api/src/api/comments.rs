//! Comment endpoints
//!
//! The review in the path must belong to the title in the path, otherwise
//! every operation answers 404.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use yamdb_common::db::comments::{self, CommentInput};
use yamdb_common::db::models::{Comment, Review};
use yamdb_common::db::reviews;
use yamdb_common::permissions::Policy;

use super::extract::{JsonBody, PathParams, QueryParams};
use super::reviews::PageQuery;
use super::{route_slashed, Caller};
use crate::pagination::{calculate_pagination, Page};
use crate::{ApiResult, AppState};

const POLICY: Policy = Policy::AuthorOrStaffOrReadOnly;

async fn parent_review(state: &AppState, title_id: i64, review_id: i64) -> ApiResult<Review> {
    Ok(reviews::get(&state.db, title_id, review_id).await?)
}

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/comments/
pub async fn list_comments(
    State(state): State<AppState>,
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    QueryParams(query): QueryParams<PageQuery>,
) -> ApiResult<Json<Page<Comment>>> {
    let review = parent_review(&state, title_id, review_id).await?;

    let total = comments::count(&state.db, review.id).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), state.page_size());
    let results = comments::list(&state.db, review.id, pagination.page_size, pagination.offset).await?;

    Ok(Json(Page::new(results, total, pagination)))
}

/// POST /api/v1/titles/{title_id}/reviews/{review_id}/comments/
pub async fn create_comment(
    State(state): State<AppState>,
    caller: Caller,
    PathParams((title_id, review_id)): PathParams<(i64, i64)>,
    JsonBody(input): JsonBody<CommentInput>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    caller.authorize(POLICY, &Method::POST, None)?;
    let author = caller.require()?;
    let review = parent_review(&state, title_id, review_id).await?;

    let comment = comments::create(&state.db, review.id, author.id, input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn get_comment(
    State(state): State<AppState>,
    PathParams((title_id, review_id, comment_id)): PathParams<(i64, i64, i64)>,
) -> ApiResult<Json<Comment>> {
    let review = parent_review(&state, title_id, review_id).await?;
    Ok(Json(comments::get(&state.db, review.id, comment_id).await?))
}

/// PATCH /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn update_comment(
    State(state): State<AppState>,
    caller: Caller,
    PathParams((title_id, review_id, comment_id)): PathParams<(i64, i64, i64)>,
    JsonBody(input): JsonBody<CommentInput>,
) -> ApiResult<Json<Comment>> {
    caller.authorize(POLICY, &Method::PATCH, None)?;
    let review = parent_review(&state, title_id, review_id).await?;
    let comment = comments::get(&state.db, review.id, comment_id).await?;
    caller.authorize(POLICY, &Method::PATCH, Some(comment.author_id))?;

    Ok(Json(comments::update(&state.db, &comment, input).await?))
}

/// DELETE /api/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}/
pub async fn delete_comment(
    State(state): State<AppState>,
    caller: Caller,
    PathParams((title_id, review_id, comment_id)): PathParams<(i64, i64, i64)>,
) -> ApiResult<StatusCode> {
    caller.authorize(POLICY, &Method::DELETE, None)?;
    let review = parent_review(&state, title_id, review_id).await?;
    let comment = comments::get(&state.db, review.id, comment_id).await?;
    caller.authorize(POLICY, &Method::DELETE, Some(comment.author_id))?;

    comments::delete(&state.db, &comment).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn comment_routes() -> Router<AppState> {
    let router = Router::new();
    let router = route_slashed(
        router,
        "/titles/:title_id/reviews/:review_id/comments",
        get(list_comments).post(create_comment),
    );
    route_slashed(
        router,
        "/titles/:title_id/reviews/:review_id/comments/:comment_id",
        get(get_comment).patch(update_comment).delete(delete_comment),
    )
}
