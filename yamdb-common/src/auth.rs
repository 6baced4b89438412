//! Confirmation codes and access tokens
//!
//! Signup mails a random code to the account's address; only a SHA-256
//! digest is stored. Exchanging the code clears it and yields an HS256
//! access token.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::db::models::User;
use crate::db::settings::{get_setting, set_setting};
use crate::db::users::{self, NewUser};
use crate::mail::{MailMessage, Mailer};
use crate::validation::{validate_email, validate_username, FieldErrors};
use crate::{Error, Result};

/// Settings key of the generated signing secret
pub const SIGNING_SECRET_KEY: &str = "token_signing_secret";

const GENERATED_SECRET_LENGTH: usize = 64;

const INVALID_CODE: &str = "Invalid confirmation code.";

/// Random alphanumeric string of `length` characters
pub fn generate_confirmation_code(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Hex SHA-256 digest of a confirmation code
pub fn hash_code(code: &str) -> String {
    format!("{:x}", Sha256::digest(code.as_bytes()))
}

/// Access token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| Error::Token(format!("Malformed subject '{}'", self.sub)))
    }
}

/// Issues and verifies access tokens
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenSigner {
    pub fn new(secret: &[u8], lifetime_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            lifetime: Duration::minutes(lifetime_minutes),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Signing secret from configuration, or the one persisted in `settings`
///
/// A secret is generated and stored on first use so tokens survive restarts.
pub async fn load_signing_secret(pool: &SqlitePool, configured: Option<&str>) -> Result<String> {
    if let Some(secret) = configured.filter(|s| !s.is_empty()) {
        return Ok(secret.to_string());
    }

    if let Some(secret) = get_setting(pool, SIGNING_SECRET_KEY).await? {
        return Ok(secret);
    }

    let secret = generate_confirmation_code(GENERATED_SECRET_LENGTH);
    set_setting(pool, SIGNING_SECRET_KEY, &secret).await?;
    info!("Generated new token signing secret");
    Ok(secret)
}

/// Body of `POST /auth/signup/`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Body of `POST /auth/token/`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
}

/// Register an account, or re-issue a code for an existing exact match
pub async fn signup(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    config: &AuthConfig,
    from_address: &str,
    request: SignupRequest,
) -> Result<User> {
    let username = request.username.unwrap_or_default();
    let email = request.email.unwrap_or_default();

    let mut errors = FieldErrors::new();
    validate_username(&mut errors, &username);
    validate_email(&mut errors, &email);
    errors.into_result()?;

    let by_username = users::find_by_username(pool, &username).await?;
    let by_email = users::find_by_email(pool, &email).await?;

    let user = match (by_username, by_email) {
        (Some(existing), Some(same)) if existing.id == same.id => existing,
        (None, None) => {
            users::create_user(
                pool,
                NewUser {
                    username: Some(username),
                    email: Some(email),
                    ..NewUser::default()
                },
            )
            .await?
        }
        (by_username, by_email) => {
            let mut errors = FieldErrors::new();
            if by_username.is_some() {
                errors.add("username", "A user with that username already exists.");
            }
            if by_email.is_some() {
                errors.add("email", "A user with that email already exists.");
            }
            return Err(Error::Validation(errors));
        }
    };

    issue_confirmation_code(pool, mailer, config, from_address, &user).await?;
    Ok(user)
}

/// Generate a fresh code for `user`, store its digest and mail it
///
/// Any previously issued code stops working.
pub async fn issue_confirmation_code(
    pool: &SqlitePool,
    mailer: &dyn Mailer,
    config: &AuthConfig,
    from_address: &str,
    user: &User,
) -> Result<()> {
    let code = generate_confirmation_code(config.confirmation_code_length);
    users::store_confirmation_code(pool, user.id, &hash_code(&code), Utc::now()).await?;

    let message = MailMessage {
        from: from_address.to_string(),
        to: user.email.clone(),
        subject: "YaMDb confirmation code".to_string(),
        body: format!(
            "Your confirmation code: {}\nIt expires in {} minutes.",
            code, config.confirmation_code_lifetime_minutes
        ),
    };
    mailer.send(&message).await?;

    info!(username = %user.username, "Confirmation code issued");
    Ok(())
}

/// Trade a confirmation code for an access token
pub async fn exchange_code(
    pool: &SqlitePool,
    signer: &TokenSigner,
    config: &AuthConfig,
    request: TokenRequest,
) -> Result<String> {
    let username = request.username.unwrap_or_default();
    if username.is_empty() {
        return Err(Error::field("username", "This field is required."));
    }

    let user = users::get_by_username(pool, &username).await?;

    let code = request.confirmation_code.unwrap_or_default();
    if code.is_empty() {
        return Err(Error::field("confirmation_code", "This field is required."));
    }

    let (Some(stored_hash), Some(issued_at)) = (
        user.confirmation_code_hash.as_deref(),
        user.confirmation_code_issued_at,
    ) else {
        return Err(Error::field("confirmation_code", INVALID_CODE));
    };

    let code_hash = hash_code(&code);
    if code_hash != stored_hash {
        warn!(username = %user.username, "Rejected confirmation code");
        return Err(Error::field("confirmation_code", INVALID_CODE));
    }

    let expires_at = issued_at + Duration::minutes(config.confirmation_code_lifetime_minutes);
    if Utc::now() > expires_at {
        return Err(Error::field(
            "confirmation_code",
            "Confirmation code has expired.",
        ));
    }

    if !users::consume_confirmation_code(pool, user.id, &code_hash).await? {
        return Err(Error::field("confirmation_code", INVALID_CODE));
    }

    let token = signer.issue(&user)?;
    info!(username = %user.username, "Access token issued");
    Ok(token)
}
