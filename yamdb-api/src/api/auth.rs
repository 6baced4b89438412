//! Bearer token middleware
//!
//! Resolves `Authorization: Bearer <token>` into a [`Caller`] request
//! extension. A request without the header proceeds anonymously; a header
//! carrying a bad, expired or orphaned token is rejected with 401.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use yamdb_common::db::users;
use yamdb_common::permissions::{Policy, Requester};

use crate::{ApiError, AppState};

/// Who is making the request; `None` for anonymous callers
#[derive(Debug, Clone, Default)]
pub struct Caller(pub Option<Requester>);

impl Caller {
    pub fn requester(&self) -> Option<&Requester> {
        self.0.as_ref()
    }

    /// Apply `policy` to `method`, optionally against an object's author
    pub fn authorize(
        &self,
        policy: Policy,
        method: &Method,
        author_id: Option<i64>,
    ) -> Result<(), ApiError> {
        policy.check(method.as_str(), self.requester(), author_id)?;
        Ok(())
    }

    /// The authenticated requester, or 401
    pub fn require(&self) -> Result<&Requester, ApiError> {
        self.requester().ok_or_else(|| {
            ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
        })
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Caller>().cloned().unwrap_or_default())
    }
}

/// Authentication middleware
///
/// Role is read from the database on every request, so promotions and
/// demotions apply to tokens already issued.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match bearer_token(request.headers())? {
        Some(token) => Caller(Some(resolve(&state, token).await?)),
        None => Caller(None),
    };

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Malformed Authorization header".to_string()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(ApiError::Unauthorized(
            "Authorization header must be 'Bearer <token>'".to_string(),
        )),
    }
}

async fn resolve(state: &AppState, token: &str) -> Result<Requester, ApiError> {
    let claims = state.signer.verify(token).map_err(|e| {
        debug!("Token rejected: {}", e);
        ApiError::Unauthorized("Given token not valid or expired".to_string())
    })?;

    let user_id = claims
        .user_id()
        .map_err(|_| ApiError::Unauthorized("Given token not valid or expired".to_string()))?;

    let user = users::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    Ok(Requester {
        id: user.id,
        username: user.username,
        role: user.role,
    })
}
