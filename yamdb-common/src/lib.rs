//! # YaMDb Common Library
//!
//! Shared code for the YaMDb review service:
//! - Database schema and repository functions
//! - Title rating aggregation
//! - Role-based access policies
//! - Confirmation codes and access tokens
//! - Mail delivery backends
//! - Configuration loading
//! - Field validation

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mail;
pub mod permissions;
pub mod rating;
pub mod validation;

pub use error::{Error, Result};
