//! Titles
//!
//! Writes reference genres and the category by slug; reads return them as
//! embedded objects. The `rating` column is owned by [`crate::rating`] and is
//! never written from here.

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;

use super::catalog::{self, Catalog};
use super::like_pattern;
use super::models::{Genre, Title, TitleRow};
use crate::validation::{validate_required, validate_year, FieldErrors, NAME_MAX_LENGTH};
use crate::{Error, Result};

const TITLE_SELECT: &str = "SELECT t.id, t.name, t.year, t.rating, t.description, t.category_id, \
     c.name AS category_name, c.slug AS category_slug \
     FROM titles t LEFT JOIN categories c ON c.id = t.category_id";

/// Fields accepted when creating a title
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewTitle {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    /// Genre slugs, at least one
    pub genre: Option<Vec<String>>,
    /// Category slug
    pub category: Option<String>,
}

/// Partial update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TitlePatch {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub genre: Option<Vec<String>>,
    pub category: Option<String>,
}

/// List filters; all conditions must hold
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TitleFilter {
    /// Case-insensitive substring of the title name
    pub name: Option<String>,
    /// Free-text search over the title name
    pub search: Option<String>,
    pub year: Option<i32>,
    /// Category slug
    pub category: Option<String>,
    /// Genre slug
    pub genre: Option<String>,
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &TitleFilter) {
    qb.push(" WHERE 1 = 1");
    if let Some(name) = &filter.name {
        qb.push(" AND t.name LIKE ")
            .push_bind(like_pattern(name))
            .push(" ESCAPE '\\'");
    }
    if let Some(search) = &filter.search {
        qb.push(" AND t.name LIKE ")
            .push_bind(like_pattern(search))
            .push(" ESCAPE '\\'");
    }
    if let Some(year) = filter.year {
        qb.push(" AND t.year = ").push_bind(year);
    }
    if let Some(category) = &filter.category {
        qb.push(" AND c.slug = ").push_bind(category.clone());
    }
    if let Some(genre) = &filter.genre {
        qb.push(
            " AND EXISTS (SELECT 1 FROM genre_title gt JOIN genres g ON g.id = gt.genre_id \
             WHERE gt.title_id = t.id AND g.slug = ",
        )
        .push_bind(genre.clone())
        .push(")");
    }
}

/// Titles matching `filter`, newest release year first
pub async fn list(
    pool: &SqlitePool,
    filter: &TitleFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Title>> {
    let mut qb = QueryBuilder::<Sqlite>::new(TITLE_SELECT);
    push_filters(&mut qb, filter);
    qb.push(" ORDER BY t.year DESC, t.id LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows: Vec<TitleRow> = qb.build_query_as().fetch_all(pool).await?;
    attach_genres(pool, rows).await
}

pub async fn count(pool: &SqlitePool, filter: &TitleFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT COUNT(*) FROM titles t LEFT JOIN categories c ON c.id = t.category_id",
    );
    push_filters(&mut qb, filter);
    let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

/// Fetch one title or fail with `NotFound`
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Title> {
    let row = sqlx::query_as::<_, TitleRow>(&format!("{} WHERE t.id = ?", TITLE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| not_found(id))?;

    let mut titles = attach_genres(pool, vec![row]).await?;
    titles.pop().ok_or_else(|| not_found(id))
}

/// True when a title with this id exists
pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM titles WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

pub async fn create(pool: &SqlitePool, input: NewTitle) -> Result<Title> {
    let mut errors = FieldErrors::new();

    let name = input.name.unwrap_or_default();
    validate_required(&mut errors, "name", &name, NAME_MAX_LENGTH);

    match input.year {
        Some(year) => validate_year(&mut errors, year),
        None => errors.add("year", "This field is required."),
    }

    let genre_ids = match input.genre {
        Some(slugs) => resolve_genres(pool, &slugs, &mut errors).await?,
        None => {
            errors.add("genre", "This field is required.");
            Vec::new()
        }
    };

    let category_id = match input.category {
        Some(slug) => resolve_category(pool, &slug, &mut errors).await?,
        None => {
            errors.add("category", "This field is required.");
            None
        }
    };

    errors.into_result()?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO titles (name, year, description, category_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(input.year)
    .bind(input.description.unwrap_or_default())
    .bind(category_id)
    .execute(&mut *tx)
    .await?;

    let id = result.last_insert_rowid();
    replace_genres(&mut *tx, id, &genre_ids).await?;
    tx.commit().await?;

    info!(title_id = id, name = %name, "Title created");
    get(pool, id).await
}

pub async fn update(pool: &SqlitePool, id: i64, patch: TitlePatch) -> Result<Title> {
    if !exists(pool, id).await? {
        return Err(not_found(id));
    }

    let mut errors = FieldErrors::new();

    if let Some(name) = patch.name.as_deref() {
        validate_required(&mut errors, "name", name, NAME_MAX_LENGTH);
    }
    if let Some(year) = patch.year {
        validate_year(&mut errors, year);
    }
    let genre_ids = match patch.genre.as_deref() {
        Some(slugs) => Some(resolve_genres(pool, slugs, &mut errors).await?),
        None => None,
    };
    let category_id = match patch.category.as_deref() {
        Some(slug) => resolve_category(pool, slug, &mut errors).await?,
        None => None,
    };

    errors.into_result()?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE titles SET
             name = COALESCE(?, name),
             year = COALESCE(?, year),
             description = COALESCE(?, description),
             category_id = COALESCE(?, category_id)
         WHERE id = ?",
    )
    .bind(patch.name)
    .bind(patch.year)
    .bind(patch.description)
    .bind(category_id)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if let Some(genre_ids) = genre_ids {
        replace_genres(&mut *tx, id, &genre_ids).await?;
    }

    tx.commit().await?;
    get(pool, id).await
}

/// Delete a title with its reviews and their comments
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM titles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }

    info!(title_id = id, "Title deleted");
    Ok(())
}

fn not_found(id: i64) -> Error {
    Error::NotFound(format!("Title {} does not exist", id))
}

/// Map genre slugs to ids, recording unknown slugs as errors
async fn resolve_genres(
    pool: &SqlitePool,
    slugs: &[String],
    errors: &mut FieldErrors,
) -> Result<Vec<i64>> {
    if slugs.is_empty() {
        errors.add("genre", "This list may not be empty.");
        return Ok(Vec::new());
    }

    let mut ids = BTreeSet::new();
    for slug in slugs {
        match catalog::find_by_slug(pool, Catalog::Genres, slug).await? {
            Some(genre) => {
                ids.insert(genre.id);
            }
            None => errors.add("genre", format!("Genre with slug '{}' does not exist.", slug)),
        }
    }
    Ok(ids.into_iter().collect())
}

async fn resolve_category(
    pool: &SqlitePool,
    slug: &str,
    errors: &mut FieldErrors,
) -> Result<Option<i64>> {
    match catalog::find_by_slug(pool, Catalog::Categories, slug).await? {
        Some(category) => Ok(Some(category.id)),
        None => {
            errors.add(
                "category",
                format!("Category with slug '{}' does not exist.", slug),
            );
            Ok(None)
        }
    }
}

async fn replace_genres(conn: &mut SqliteConnection, title_id: i64, genre_ids: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM genre_title WHERE title_id = ?")
        .bind(title_id)
        .execute(&mut *conn)
        .await?;

    for genre_id in genre_ids {
        sqlx::query("INSERT INTO genre_title (genre_id, title_id) VALUES (?, ?)")
            .bind(genre_id)
            .bind(title_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Load genres for a batch of title rows in one query
async fn attach_genres(pool: &SqlitePool, rows: Vec<TitleRow>) -> Result<Vec<Title>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT gt.title_id, g.id, g.name, g.slug FROM genre_title gt \
         JOIN genres g ON g.id = gt.genre_id WHERE gt.title_id IN (",
    );
    let mut ids = qb.separated(", ");
    for row in &rows {
        ids.push_bind(row.id);
    }
    ids.push_unseparated(") ORDER BY g.slug");

    let genre_rows: Vec<(i64, i64, String, String)> = qb.build_query_as().fetch_all(pool).await?;

    let mut by_title: HashMap<i64, Vec<Genre>> = HashMap::new();
    for (title_id, id, name, slug) in genre_rows {
        by_title
            .entry(title_id)
            .or_default()
            .push(Genre { id, name, slug });
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let genre = by_title.remove(&row.id).unwrap_or_default();
            row.into_title(genre)
        })
        .collect())
}
