//! Title endpoints

use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use yamdb_common::db::models::Title;
use yamdb_common::db::titles::{self, NewTitle, TitleFilter, TitlePatch};
use yamdb_common::permissions::Policy;
use yamdb_common::validation::FieldErrors;

use super::extract::{JsonBody, PathParams, QueryParams};
use super::{route_slashed, Caller};
use crate::pagination::{calculate_pagination, Page};
use crate::{ApiError, ApiResult, AppState};

/// `?name=&search=&year=&category=&genre=&page=`
///
/// Empty values mean "no filter".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TitleQuery {
    pub name: Option<String>,
    pub search: Option<String>,
    pub year: Option<String>,
    pub category: Option<String>,
    pub genre: Option<String>,
    pub page: Option<i64>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl TitleQuery {
    fn filter(&self) -> ApiResult<TitleFilter> {
        let year = match non_empty(&self.year) {
            None => None,
            Some(raw) => match raw.parse::<i32>() {
                Ok(year) => Some(year),
                Err(_) => {
                    let mut errors = FieldErrors::new();
                    errors.add("year", "Enter a whole number.");
                    return Err(ApiError::Validation(errors));
                }
            },
        };

        Ok(TitleFilter {
            name: non_empty(&self.name),
            search: non_empty(&self.search),
            year,
            category: non_empty(&self.category),
            genre: non_empty(&self.genre),
        })
    }
}

/// GET /api/v1/titles/
pub async fn list_titles(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TitleQuery>,
) -> ApiResult<Json<Page<Title>>> {
    let filter = query.filter()?;
    let total = titles::count(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), state.page_size());
    let results = titles::list(&state.db, &filter, pagination.page_size, pagination.offset).await?;

    Ok(Json(Page::new(results, total, pagination)))
}

/// POST /api/v1/titles/
pub async fn create_title(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(input): JsonBody<NewTitle>,
) -> ApiResult<(StatusCode, Json<Title>)> {
    caller.authorize(Policy::AdminOrReadOnly, &Method::POST, None)?;
    let title = titles::create(&state.db, input).await?;
    Ok((StatusCode::CREATED, Json(title)))
}

/// GET /api/v1/titles/{title_id}/
pub async fn get_title(
    State(state): State<AppState>,
    PathParams(title_id): PathParams<i64>,
) -> ApiResult<Json<Title>> {
    Ok(Json(titles::get(&state.db, title_id).await?))
}

/// PATCH /api/v1/titles/{title_id}/
pub async fn update_title(
    State(state): State<AppState>,
    caller: Caller,
    PathParams(title_id): PathParams<i64>,
    JsonBody(patch): JsonBody<TitlePatch>,
) -> ApiResult<Json<Title>> {
    caller.authorize(Policy::AdminOrReadOnly, &Method::PATCH, None)?;
    Ok(Json(titles::update(&state.db, title_id, patch).await?))
}

/// DELETE /api/v1/titles/{title_id}/
pub async fn delete_title(
    State(state): State<AppState>,
    caller: Caller,
    PathParams(title_id): PathParams<i64>,
) -> ApiResult<StatusCode> {
    caller.authorize(Policy::AdminOrReadOnly, &Method::DELETE, None)?;
    titles::delete(&state.db, title_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn title_routes() -> Router<AppState> {
    let router = Router::new();
    let router = route_slashed(router, "/titles", get(list_titles).post(create_title));
    route_slashed(
        router,
        "/titles/:title_id",
        get(get_title).patch(update_title).delete(delete_title),
    )
}
