//! Category and genre endpoints
//!
//! Both resources share these handlers; the router for each injects the
//! [`Catalog`] it serves as a request extension.

use axum::{
    extract::State,
    http::{Method, StatusCode},
    routing::{get, patch},
    Extension, Json, Router,
};
use yamdb_common::db::catalog::{self, Catalog, EntryPatch, NewEntry};
use yamdb_common::db::models::CatalogEntry;
use yamdb_common::permissions::Policy;

use super::extract::{JsonBody, PathParams, QueryParams};
use super::users::SearchQuery;
use super::{route_slashed, Caller};
use crate::pagination::{calculate_pagination, Page};
use crate::{ApiResult, AppState};

/// GET /api/v1/{categories,genres}/
pub async fn list_entries(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<Json<Page<CatalogEntry>>> {
    let search = query.search.as_deref();
    let total = catalog::count(&state.db, catalog, search).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1), state.page_size());
    let results = catalog::list(
        &state.db,
        catalog,
        search,
        pagination.page_size,
        pagination.offset,
    )
    .await?;

    Ok(Json(Page::new(results, total, pagination)))
}

/// POST /api/v1/{categories,genres}/
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    caller: Caller,
    JsonBody(input): JsonBody<NewEntry>,
) -> ApiResult<(StatusCode, Json<CatalogEntry>)> {
    caller.authorize(Policy::AdminOrReadOnly, &Method::POST, None)?;
    let entry = catalog::create(&state.db, catalog, input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// PATCH /api/v1/{categories,genres}/{slug}/
pub async fn rename_entry(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    caller: Caller,
    PathParams(slug): PathParams<String>,
    JsonBody(input): JsonBody<EntryPatch>,
) -> ApiResult<Json<CatalogEntry>> {
    caller.authorize(Policy::AdminOrReadOnly, &Method::PATCH, None)?;
    let entry = catalog::get_by_slug(&state.db, catalog, &slug).await?;
    Ok(Json(catalog::rename(&state.db, catalog, &entry, input).await?))
}

/// DELETE /api/v1/{categories,genres}/{slug}/
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(catalog): Extension<Catalog>,
    caller: Caller,
    PathParams(slug): PathParams<String>,
) -> ApiResult<StatusCode> {
    caller.authorize(Policy::AdminOrReadOnly, &Method::DELETE, None)?;
    let entry = catalog::get_by_slug(&state.db, catalog, &slug).await?;
    catalog::delete(&state.db, catalog, &entry).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn entry_routes(base: &str, catalog: Catalog) -> Router<AppState> {
    let router = Router::new();
    let router = route_slashed(router, base, get(list_entries).post(create_entry));
    route_slashed(
        router,
        &format!("{}/:slug", base),
        patch(rename_entry).delete(delete_entry),
    )
    .layer(Extension(catalog))
}

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .merge(entry_routes("/categories", Catalog::Categories))
        .merge(entry_routes("/genres", Catalog::Genres))
}
