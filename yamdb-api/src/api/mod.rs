//! HTTP handlers grouped by resource

use axum::routing::MethodRouter;
use axum::Router;

use crate::AppState;

pub mod auth;
pub mod catalog;
pub mod comments;
pub mod extract;
pub mod health;
pub mod reviews;
pub mod signup;
pub mod titles;
pub mod users;

pub use auth::{auth_middleware, Caller};
pub use catalog::catalog_routes;
pub use comments::comment_routes;
pub use health::health_routes;
pub use reviews::review_routes;
pub use signup::auth_routes;
pub use titles::title_routes;
pub use users::user_routes;

/// Register `path` both with and without a trailing slash
pub(crate) fn route_slashed(
    router: Router<AppState>,
    path: &str,
    method_router: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(path, method_router.clone())
        .route(&format!("{}/", path), method_router)
}
