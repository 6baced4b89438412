//! User accounts
//!
//! Registration, admin management and profile editing all funnel through
//! here so username/email uniqueness is checked the same way everywhere.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use super::{like_pattern, models::User};
use crate::error::is_unique_violation;
use crate::permissions::Role;
use crate::rating;
use crate::validation::{
    validate_email, validate_length, validate_username, FieldErrors, PERSON_NAME_MAX_LENGTH,
};
use crate::{Error, Result};

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, bio, role, \
     confirmation_code_hash, confirmation_code_issued_at, date_joined";

/// Account fields accepted on creation
///
/// Every field is optional at the type level so missing values surface as
/// field errors instead of deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<String>,
}

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<String>,
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = ?",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Look up by username or fail with `NotFound`
pub async fn get_by_username(pool: &SqlitePool, username: &str) -> Result<User> {
    find_by_username(pool, username)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User '{}' does not exist", username)))
}

/// Users whose username contains `search`, newest first
pub async fn list_users(
    pool: &SqlitePool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users
         WHERE (?1 IS NULL OR username LIKE ?1 ESCAPE '\\')
         ORDER BY date_joined DESC, id DESC
         LIMIT ?2 OFFSET ?3",
        USER_COLUMNS
    ))
    .bind(search.map(like_pattern))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

pub async fn count_users(pool: &SqlitePool, search: Option<&str>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE (?1 IS NULL OR username LIKE ?1 ESCAPE '\\')",
    )
    .bind(search.map(like_pattern))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Create an account after validating every field
pub async fn create_user(pool: &SqlitePool, input: NewUser) -> Result<User> {
    let mut errors = FieldErrors::new();

    let username = input.username.unwrap_or_default();
    let email = input.email.unwrap_or_default();
    validate_username(&mut errors, &username);
    validate_email(&mut errors, &email);

    let first_name = input.first_name.unwrap_or_default();
    let last_name = input.last_name.unwrap_or_default();
    validate_length(&mut errors, "first_name", &first_name, PERSON_NAME_MAX_LENGTH);
    validate_length(&mut errors, "last_name", &last_name, PERSON_NAME_MAX_LENGTH);

    let role = parse_role(&mut errors, input.role.as_deref()).unwrap_or_default();

    if !errors.contains("username") && find_by_username(pool, &username).await?.is_some() {
        errors.add("username", "A user with that username already exists.");
    }
    if !errors.contains("email") && find_by_email(pool, &email).await?.is_some() {
        errors.add("email", "A user with that email already exists.");
    }
    errors.into_result()?;

    let result = sqlx::query(
        "INSERT INTO users (username, email, first_name, last_name, bio, role, date_joined)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&username)
    .bind(&email)
    .bind(&first_name)
    .bind(&last_name)
    .bind(input.bio.unwrap_or_default())
    .bind(role)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(duplicate_account)?;

    info!(username = %username, role = %role, "User created");

    let id = result.last_insert_rowid();
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::Internal(format!("User {} vanished after insert", id)))
}

/// Apply a partial update after validating the supplied fields
pub async fn update_user(pool: &SqlitePool, user: &User, patch: UserPatch) -> Result<User> {
    let mut errors = FieldErrors::new();

    if let Some(username) = patch.username.as_deref() {
        validate_username(&mut errors, username);
        if !errors.contains("username") && username != user.username {
            if find_by_username(pool, username).await?.is_some() {
                errors.add("username", "A user with that username already exists.");
            }
        }
    }
    if let Some(email) = patch.email.as_deref() {
        validate_email(&mut errors, email);
        if !errors.contains("email") && email != user.email {
            if find_by_email(pool, email).await?.is_some() {
                errors.add("email", "A user with that email already exists.");
            }
        }
    }
    if let Some(first_name) = patch.first_name.as_deref() {
        validate_length(&mut errors, "first_name", first_name, PERSON_NAME_MAX_LENGTH);
    }
    if let Some(last_name) = patch.last_name.as_deref() {
        validate_length(&mut errors, "last_name", last_name, PERSON_NAME_MAX_LENGTH);
    }
    let role = parse_role(&mut errors, patch.role.as_deref());
    errors.into_result()?;

    sqlx::query(
        "UPDATE users SET
             username = COALESCE(?, username),
             email = COALESCE(?, email),
             first_name = COALESCE(?, first_name),
             last_name = COALESCE(?, last_name),
             bio = COALESCE(?, bio),
             role = COALESCE(?, role)
         WHERE id = ?",
    )
    .bind(patch.username)
    .bind(patch.email)
    .bind(patch.first_name)
    .bind(patch.last_name)
    .bind(patch.bio)
    .bind(role)
    .bind(user.id)
    .execute(pool)
    .await
    .map_err(duplicate_account)?;

    find_by_id(pool, user.id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User '{}' does not exist", user.username)))
}

/// Delete an account together with its reviews and comments
///
/// Titles that lose a review through the cascade get their rating
/// recomputed in the same transaction.
pub async fn delete_user(pool: &SqlitePool, user: &User) -> Result<()> {
    let mut tx = pool.begin().await?;

    let title_ids: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT title_id FROM reviews WHERE author_id = ?")
            .bind(user.id)
            .fetch_all(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    for title_id in &title_ids {
        rating::recompute(&mut *tx, *title_id).await?;
    }

    tx.commit().await?;

    info!(
        username = %user.username,
        affected_titles = title_ids.len(),
        "User deleted"
    );
    Ok(())
}

/// Store the digest of a freshly issued confirmation code
pub async fn store_confirmation_code(
    pool: &SqlitePool,
    user_id: i64,
    code_hash: &str,
    issued_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET confirmation_code_hash = ?, confirmation_code_issued_at = ? WHERE id = ?",
    )
    .bind(code_hash)
    .bind(issued_at)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Clear the confirmation code if it still matches `code_hash`
///
/// Returns `false` when another request consumed it first.
pub async fn consume_confirmation_code(
    pool: &SqlitePool,
    user_id: i64,
    code_hash: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE users SET confirmation_code_hash = NULL, confirmation_code_issued_at = NULL
         WHERE id = ? AND confirmation_code_hash = ?",
    )
    .bind(user_id)
    .bind(code_hash)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

fn parse_role(errors: &mut FieldErrors, role: Option<&str>) -> Option<Role> {
    match role.map(str::parse::<Role>) {
        None => None,
        Some(Ok(role)) => Some(role),
        Some(Err(_)) => {
            errors.add("role", format!("\"{}\" is not a valid choice.", role.unwrap_or_default()));
            None
        }
    }
}

/// Map a UNIQUE violation raised by a concurrent write to a field error
///
/// SQLite names the failing column in the message
/// (`UNIQUE constraint failed: users.email`).
fn duplicate_account(err: sqlx::Error) -> Error {
    if !is_unique_violation(&err) {
        return Error::Database(err);
    }

    let message = err
        .as_database_error()
        .map(|db_err| db_err.message().to_string())
        .unwrap_or_default();

    let mut errors = FieldErrors::new();
    let username = message.contains("users.username");
    let email = message.contains("users.email");
    if username || !email {
        errors.add("username", "A user with that username already exists.");
    }
    if email || !username {
        errors.add("email", "A user with that email already exists.");
    }
    Error::Validation(errors)
}
