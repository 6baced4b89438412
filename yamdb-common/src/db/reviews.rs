//! Reviews
//!
//! Every write here recomputes the parent title's rating inside the same
//! transaction, see [`crate::rating`].

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use super::models::Review;
use super::titles;
use crate::error::is_unique_violation;
use crate::rating;
use crate::validation::{validate_score, FieldErrors};
use crate::{Error, Result};

const REVIEW_SELECT: &str = "SELECT r.id, r.title_id, r.text, u.username AS author, r.author_id, \
     r.score, r.pub_date FROM reviews r JOIN users u ON u.id = r.author_id";

const DUPLICATE_REVIEW: &str = "You have already reviewed this title.";

/// Review body for create and partial update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewInput {
    pub text: Option<String>,
    pub score: Option<i64>,
}

/// Reviews of a title, newest first
pub async fn list(pool: &SqlitePool, title_id: i64, limit: i64, offset: i64) -> Result<Vec<Review>> {
    let reviews = sqlx::query_as::<_, Review>(&format!(
        "{} WHERE r.title_id = ? ORDER BY r.pub_date DESC, r.id DESC LIMIT ? OFFSET ?",
        REVIEW_SELECT
    ))
    .bind(title_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(reviews)
}

pub async fn count(pool: &SqlitePool, title_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE title_id = ?")
        .bind(title_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Fetch a review that belongs to `title_id`
pub async fn get(pool: &SqlitePool, title_id: i64, review_id: i64) -> Result<Review> {
    sqlx::query_as::<_, Review>(&format!(
        "{} WHERE r.id = ? AND r.title_id = ?",
        REVIEW_SELECT
    ))
    .bind(review_id)
    .bind(title_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        Error::NotFound(format!(
            "Review {} does not exist for title {}",
            review_id, title_id
        ))
    })
}

/// Create the author's single review of a title
pub async fn create(
    pool: &SqlitePool,
    title_id: i64,
    author_id: i64,
    input: ReviewInput,
) -> Result<Review> {
    if !titles::exists(pool, title_id).await? {
        return Err(Error::NotFound(format!("Title {} does not exist", title_id)));
    }

    let mut errors = FieldErrors::new();
    let text = input.text.unwrap_or_default();
    if text.trim().is_empty() {
        errors.add("text", "This field may not be blank.");
    }
    match input.score {
        Some(score) => validate_score(&mut errors, score),
        None => errors.add("score", "This field is required."),
    }
    errors.into_result()?;

    let mut tx = pool.begin().await?;

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM reviews WHERE title_id = ? AND author_id = ?")
            .bind(title_id)
            .bind(author_id)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(Error::field("non_field_errors", DUPLICATE_REVIEW));
    }

    let result = sqlx::query(
        "INSERT INTO reviews (title_id, author_id, text, score, pub_date) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(title_id)
    .bind(author_id)
    .bind(&text)
    .bind(input.score)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::field("non_field_errors", DUPLICATE_REVIEW)
        } else {
            Error::Database(e)
        }
    })?;

    let review_id = result.last_insert_rowid();
    let rating = rating::recompute(&mut *tx, title_id).await?;
    tx.commit().await?;

    info!(title_id, review_id, author_id, ?rating, "Review created");
    get(pool, title_id, review_id).await
}

/// Apply a partial update to `review`
pub async fn update(pool: &SqlitePool, review: &Review, input: ReviewInput) -> Result<Review> {
    let mut errors = FieldErrors::new();
    if let Some(text) = input.text.as_deref() {
        if text.trim().is_empty() {
            errors.add("text", "This field may not be blank.");
        }
    }
    if let Some(score) = input.score {
        validate_score(&mut errors, score);
    }
    errors.into_result()?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE reviews SET text = COALESCE(?, text), score = COALESCE(?, score) WHERE id = ?",
    )
    .bind(input.text)
    .bind(input.score)
    .bind(review.id)
    .execute(&mut *tx)
    .await?;

    if input.score.is_some() {
        rating::recompute(&mut *tx, review.title_id).await?;
    }
    tx.commit().await?;

    get(pool, review.title_id, review.id).await
}

/// Delete `review` with its comments
pub async fn delete(pool: &SqlitePool, review: &Review) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(review.id)
        .execute(&mut *tx)
        .await?;

    let rating = rating::recompute(&mut *tx, review.title_id).await?;
    tx.commit().await?;

    info!(
        title_id = review.title_id,
        review_id = review.id,
        ?rating,
        "Review deleted"
    );
    Ok(())
}
