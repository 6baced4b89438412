//! Comments on reviews

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::debug;

use super::models::Comment;
use crate::validation::FieldErrors;
use crate::{Error, Result};

const COMMENT_SELECT: &str = "SELECT c.id, c.review_id, c.text, u.username AS author, \
     c.author_id, c.pub_date FROM comments c JOIN users u ON u.id = c.author_id";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentInput {
    pub text: Option<String>,
}

fn validate_text(errors: &mut FieldErrors, text: &str) {
    if text.trim().is_empty() {
        errors.add("text", "This field may not be blank.");
    }
}

/// Comments on a review, newest first
pub async fn list(
    pool: &SqlitePool,
    review_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Comment>> {
    let comments = sqlx::query_as::<_, Comment>(&format!(
        "{} WHERE c.review_id = ? ORDER BY c.pub_date DESC, c.id DESC LIMIT ? OFFSET ?",
        COMMENT_SELECT
    ))
    .bind(review_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(comments)
}

pub async fn count(pool: &SqlitePool, review_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE review_id = ?")
        .bind(review_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Fetch a comment that belongs to `review_id`
pub async fn get(pool: &SqlitePool, review_id: i64, comment_id: i64) -> Result<Comment> {
    sqlx::query_as::<_, Comment>(&format!(
        "{} WHERE c.id = ? AND c.review_id = ?",
        COMMENT_SELECT
    ))
    .bind(comment_id)
    .bind(review_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        Error::NotFound(format!(
            "Comment {} does not exist for review {}",
            comment_id, review_id
        ))
    })
}

/// Add a comment; the caller has already resolved the review
pub async fn create(
    pool: &SqlitePool,
    review_id: i64,
    author_id: i64,
    input: CommentInput,
) -> Result<Comment> {
    let mut errors = FieldErrors::new();
    let text = input.text.unwrap_or_default();
    validate_text(&mut errors, &text);
    errors.into_result()?;

    let result = sqlx::query(
        "INSERT INTO comments (review_id, author_id, text, pub_date) VALUES (?, ?, ?, ?)",
    )
    .bind(review_id)
    .bind(author_id)
    .bind(&text)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let comment_id = result.last_insert_rowid();
    debug!(review_id, comment_id, author_id, "Comment created");
    get(pool, review_id, comment_id).await
}

pub async fn update(pool: &SqlitePool, comment: &Comment, input: CommentInput) -> Result<Comment> {
    let Some(text) = input.text else {
        return Ok(comment.clone());
    };

    let mut errors = FieldErrors::new();
    validate_text(&mut errors, &text);
    errors.into_result()?;

    sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
        .bind(&text)
        .bind(comment.id)
        .execute(pool)
        .await?;

    get(pool, comment.review_id, comment.id).await
}

pub async fn delete(pool: &SqlitePool, comment: &Comment) -> Result<()> {
    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment.id)
        .execute(pool)
        .await?;

    debug!(review_id = comment.review_id, comment_id = comment.id, "Comment deleted");
    Ok(())
}
