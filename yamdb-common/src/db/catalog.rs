//! Categories and genres
//!
//! Both are name + unique slug lookup tables with identical behaviour, so
//! one set of functions serves both, parameterized by [`Catalog`].

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use super::{like_pattern, models::CatalogEntry};
use crate::error::is_unique_violation;
use crate::validation::{validate_required, validate_slug, FieldErrors, NAME_MAX_LENGTH};
use crate::{Error, Result};

/// Which lookup table an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Categories,
    Genres,
}

impl Catalog {
    fn table(&self) -> &'static str {
        match self {
            Catalog::Categories => "categories",
            Catalog::Genres => "genres",
        }
    }

    /// Singular noun for messages
    pub fn label(&self) -> &'static str {
        match self {
            Catalog::Categories => "Category",
            Catalog::Genres => "Genre",
        }
    }
}

/// Input for a new category or genre
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewEntry {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// Rename request; the slug is immutable
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EntryPatch {
    pub name: Option<String>,
}

/// Entries whose name contains `search`, ordered by slug
pub async fn list(
    pool: &SqlitePool,
    catalog: Catalog,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<CatalogEntry>> {
    let entries = sqlx::query_as::<_, CatalogEntry>(&format!(
        "SELECT id, name, slug FROM {}
         WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\')
         ORDER BY slug
         LIMIT ?2 OFFSET ?3",
        catalog.table()
    ))
    .bind(search.map(like_pattern))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

pub async fn count(pool: &SqlitePool, catalog: Catalog, search: Option<&str>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {} WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\')",
        catalog.table()
    ))
    .bind(search.map(like_pattern))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn find_by_slug(
    pool: &SqlitePool,
    catalog: Catalog,
    slug: &str,
) -> Result<Option<CatalogEntry>> {
    let entry = sqlx::query_as::<_, CatalogEntry>(&format!(
        "SELECT id, name, slug FROM {} WHERE slug = ?",
        catalog.table()
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await?;
    Ok(entry)
}

/// Look up by slug or fail with `NotFound`
pub async fn get_by_slug(pool: &SqlitePool, catalog: Catalog, slug: &str) -> Result<CatalogEntry> {
    find_by_slug(pool, catalog, slug).await?.ok_or_else(|| {
        Error::NotFound(format!("{} with slug '{}' does not exist", catalog.label(), slug))
    })
}

pub async fn create(pool: &SqlitePool, catalog: Catalog, input: NewEntry) -> Result<CatalogEntry> {
    let mut errors = FieldErrors::new();
    let name = input.name.unwrap_or_default();
    let slug = input.slug.unwrap_or_default();
    validate_required(&mut errors, "name", &name, NAME_MAX_LENGTH);
    validate_slug(&mut errors, &slug);

    if !errors.contains("slug") && find_by_slug(pool, catalog, &slug).await?.is_some() {
        errors.add(
            "slug",
            format!("{} with this slug already exists.", catalog.label()),
        );
    }
    errors.into_result()?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (name, slug) VALUES (?, ?)",
        catalog.table()
    ))
    .bind(&name)
    .bind(&slug)
    .execute(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::field("slug", format!("{} with this slug already exists.", catalog.label()))
        } else {
            Error::Database(e)
        }
    })?;

    info!(slug = %slug, "{} created", catalog.label());

    Ok(CatalogEntry {
        id: result.last_insert_rowid(),
        name,
        slug,
    })
}

/// Change the display name of an entry
pub async fn rename(
    pool: &SqlitePool,
    catalog: Catalog,
    entry: &CatalogEntry,
    patch: EntryPatch,
) -> Result<CatalogEntry> {
    let Some(name) = patch.name else {
        return Ok(entry.clone());
    };

    let mut errors = FieldErrors::new();
    validate_required(&mut errors, "name", &name, NAME_MAX_LENGTH);
    errors.into_result()?;

    sqlx::query(&format!("UPDATE {} SET name = ? WHERE id = ?", catalog.table()))
        .bind(&name)
        .bind(entry.id)
        .execute(pool)
        .await?;

    Ok(CatalogEntry {
        id: entry.id,
        name,
        slug: entry.slug.clone(),
    })
}

/// Delete an entry
///
/// Titles keep existing: a deleted category is unset on its titles and a
/// deleted genre is dropped from their genre lists.
pub async fn delete(pool: &SqlitePool, catalog: Catalog, entry: &CatalogEntry) -> Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE id = ?", catalog.table()))
        .bind(entry.id)
        .execute(pool)
        .await?;

    info!(slug = %entry.slug, "{} deleted", catalog.label());
    Ok(())
}
