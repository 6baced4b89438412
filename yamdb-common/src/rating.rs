//! Title rating aggregation
//!
//! A title's rating is the mean of its review scores rounded to the nearest
//! integer (halves away from zero), or `NULL` when the title has no reviews.
//! The column is rewritten inside the same transaction as every review
//! write, so it never drifts from the review set.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::Result;

/// Round a mean score to the stored integer rating
fn round_rating(mean: f64) -> i64 {
    mean.round() as i64
}

/// Rounded mean of a set of scores, `None` when empty
///
/// # Examples
///
/// ```
/// use yamdb_common::rating::rounded_mean;
///
/// assert_eq!(rounded_mean(&[]), None);
/// assert_eq!(rounded_mean(&[7, 8]), Some(8));
/// assert_eq!(rounded_mean(&[1, 2, 2]), Some(2));
/// ```
pub fn rounded_mean(scores: &[i64]) -> Option<i64> {
    if scores.is_empty() {
        return None;
    }
    let sum: i64 = scores.iter().sum();
    Some(round_rating(sum as f64 / scores.len() as f64))
}

/// Recompute and store the rating of one title
///
/// Must run on the connection (usually a transaction) that performed the
/// review write so the aggregate sees the new review set.
pub async fn recompute(conn: &mut SqliteConnection, title_id: i64) -> Result<Option<i64>> {
    let scores: Vec<i64> = sqlx::query_scalar("SELECT score FROM reviews WHERE title_id = ?")
        .bind(title_id)
        .fetch_all(&mut *conn)
        .await?;

    let rating = rounded_mean(&scores);

    sqlx::query("UPDATE titles SET rating = ? WHERE id = ?")
        .bind(rating)
        .bind(title_id)
        .execute(&mut *conn)
        .await?;

    debug!(title_id, ?rating, "Title rating recomputed");
    Ok(rating)
}
