//! Field validation shared by signup, profile, catalog and review input
//!
//! Validators push messages into a [`FieldErrors`] map keyed by field name,
//! so a single request can report every problem at once.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{Error, Result};

/// Maximum username length
pub const USERNAME_MAX_LENGTH: usize = 150;
/// Maximum email length
pub const EMAIL_MAX_LENGTH: usize = 254;
/// Maximum first/last name length
pub const PERSON_NAME_MAX_LENGTH: usize = 150;
/// Maximum catalog (category, genre, title) name length
pub const NAME_MAX_LENGTH: usize = 256;
/// Maximum slug length
pub const SLUG_MAX_LENGTH: usize = 50;
/// Lowest accepted review score
pub const SCORE_MIN: i64 = 1;
/// Highest accepted review score
pub const SCORE_MAX: i64 = 10;
/// Username reserved for the own-profile endpoint
pub const RESERVED_USERNAME: &str = "me";

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Accumulated validation messages, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for one field
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded, otherwise `Error::Validation`
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

pub fn validate_username(errors: &mut FieldErrors, username: &str) {
    if username.is_empty() {
        errors.add("username", "This field may not be blank.");
    } else if username.chars().count() > USERNAME_MAX_LENGTH {
        errors.add(
            "username",
            format!("Ensure this field has no more than {} characters.", USERNAME_MAX_LENGTH),
        );
    } else if username == RESERVED_USERNAME {
        errors.add("username", "The username 'me' is reserved.");
    } else if !USERNAME_RE.is_match(username) {
        errors.add(
            "username",
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        );
    }
}

pub fn validate_email(errors: &mut FieldErrors, email: &str) {
    if email.is_empty() {
        errors.add("email", "This field may not be blank.");
    } else if email.chars().count() > EMAIL_MAX_LENGTH {
        errors.add(
            "email",
            format!("Ensure this field has no more than {} characters.", EMAIL_MAX_LENGTH),
        );
    } else if !EMAIL_RE.is_match(email) {
        errors.add("email", "Enter a valid email address.");
    }
}

/// Bounded free-text field (names, first/last name)
pub fn validate_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max),
        );
    }
}

/// Non-blank bounded text field
pub fn validate_required(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(field, "This field may not be blank.");
    } else {
        validate_length(errors, field, value, max);
    }
}

pub fn validate_slug(errors: &mut FieldErrors, slug: &str) {
    if slug.is_empty() {
        errors.add("slug", "This field may not be blank.");
    } else if slug.len() > SLUG_MAX_LENGTH {
        errors.add(
            "slug",
            format!("Ensure this field has no more than {} characters.", SLUG_MAX_LENGTH),
        );
    } else if !SLUG_RE.is_match(slug) {
        errors.add(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        );
    }
}

/// Release year may not lie in the future
pub fn validate_year(errors: &mut FieldErrors, year: i32) {
    let current = Utc::now().year();
    if year > current {
        errors.add("year", format!("Year {} has not happened yet.", year));
    }
}

pub fn validate_score(errors: &mut FieldErrors, score: i64) {
    if !(SCORE_MIN..=SCORE_MAX).contains(&score) {
        errors.add(
            "score",
            format!("Score must be between {} and {}.", SCORE_MIN, SCORE_MAX),
        );
    }
}
