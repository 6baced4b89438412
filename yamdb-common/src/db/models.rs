//! Database models

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::permissions::Role;

/// Account row
///
/// Serializes to the public profile shape; the id and confirmation code
/// columns never leave the service.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
    #[serde(skip)]
    pub confirmation_code_hash: Option<String>,
    #[serde(skip)]
    pub confirmation_code_issued_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub date_joined: DateTime<Utc>,
}

/// Category or genre
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CatalogEntry {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

pub type Category = CatalogEntry;
pub type Genre = CatalogEntry;

/// Title with its category and genres resolved
#[derive(Debug, Clone, Serialize)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub rating: Option<i64>,
    pub description: String,
    pub genre: Vec<Genre>,
    pub category: Option<Category>,
}

/// Flat `titles` row joined with its category
#[derive(Debug, Clone, FromRow)]
pub(crate) struct TitleRow {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub rating: Option<i64>,
    pub description: String,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
}

impl TitleRow {
    pub(crate) fn into_title(self, genre: Vec<Genre>) -> Title {
        let category = match (self.category_id, self.category_name, self.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(CatalogEntry { id, name, slug }),
            _ => None,
        };
        Title {
            id: self.id,
            name: self.name,
            year: self.year,
            rating: self.rating,
            description: self.description,
            genre,
            category,
        }
    }
}

/// Review with the author's username
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: i64,
    #[serde(skip)]
    pub title_id: i64,
    pub text: String,
    pub author: String,
    #[serde(skip)]
    pub author_id: i64,
    pub score: i64,
    pub pub_date: DateTime<Utc>,
}

/// Comment with the author's username
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    #[serde(skip)]
    pub review_id: i64,
    pub text: String,
    pub author: String,
    #[serde(skip)]
    pub author_id: i64,
    pub pub_date: DateTime<Utc>,
}
