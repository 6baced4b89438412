//! Signup and token exchange endpoints

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use yamdb_common::auth::{self, SignupRequest, TokenRequest};

use super::extract::JsonBody;
use super::route_slashed;
use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// POST /api/v1/auth/signup/
///
/// Creates the account if needed and mails a confirmation code.
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<SignupRequest>,
) -> ApiResult<Json<SignupResponse>> {
    let user = auth::signup(
        &state.db,
        state.mailer.as_ref(),
        &state.config.auth,
        &state.config.mail.from_address,
        request,
    )
    .await?;

    Ok(Json(SignupResponse {
        username: user.username,
        email: user.email,
    }))
}

/// POST /api/v1/auth/token/
pub async fn token(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = auth::exchange_code(&state.db, &state.signer, &state.config.auth, request).await?;
    Ok(Json(TokenResponse { token }))
}

pub fn auth_routes() -> Router<AppState> {
    let router = Router::new();
    let router = route_slashed(router, "/auth/signup", post(signup));
    route_slashed(router, "/auth/token", post(token))
}
