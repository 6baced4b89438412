//! Role-based authorization
//!
//! Every decision is a pure function of the request method, the requester
//! (absent for anonymous calls) and, for authored resources, the author id.
//! The HTTP layer maps [`Denied::Unauthenticated`] to 401 and
//! [`Denied::Forbidden`] to 403.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Moderators and admins may edit content authored by others
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(Error::field(
                "role",
                format!("\"{}\" is not a valid choice.", other),
            )),
        }
    }
}

/// Authenticated caller resolved from an access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

/// HTTP methods that never modify state
pub fn is_safe_method(method: &str) -> bool {
    matches!(method, "GET" | "HEAD" | "OPTIONS")
}

/// Why a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    /// No valid credentials were supplied
    Unauthenticated,
    /// Credentials are valid but the role or ownership is insufficient
    Forbidden,
}

/// Access rules attached to a resource family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Anyone reads; only admins write (categories, genres, titles)
    AdminOrReadOnly,
    /// Anyone reads; any user creates; author or staff modify (reviews, comments)
    AuthorOrStaffOrReadOnly,
    /// Admins only, for every method (user management)
    AdminOnly,
    /// Any authenticated user (own profile)
    Authenticated,
}

impl Policy {
    /// Decide whether `requester` may apply `method` to a resource
    ///
    /// `author_id` is the owner of an existing object; it is `None` for
    /// collection-level requests such as creation.
    pub fn check(
        &self,
        method: &str,
        requester: Option<&Requester>,
        author_id: Option<i64>,
    ) -> Result<(), Denied> {
        let safe = is_safe_method(method);
        match self {
            Policy::AdminOrReadOnly => {
                if safe {
                    return Ok(());
                }
                let requester = requester.ok_or(Denied::Unauthenticated)?;
                if requester.role.is_admin() {
                    Ok(())
                } else {
                    Err(Denied::Forbidden)
                }
            }
            Policy::AuthorOrStaffOrReadOnly => {
                if safe {
                    return Ok(());
                }
                let requester = requester.ok_or(Denied::Unauthenticated)?;
                match author_id {
                    None => Ok(()),
                    Some(author) if author == requester.id => Ok(()),
                    Some(_) if requester.role.is_staff() => Ok(()),
                    Some(_) => Err(Denied::Forbidden),
                }
            }
            Policy::AdminOnly => {
                let requester = requester.ok_or(Denied::Unauthenticated)?;
                if requester.role.is_admin() {
                    Ok(())
                } else {
                    Err(Denied::Forbidden)
                }
            }
            Policy::Authenticated => requester.map(|_| ()).ok_or(Denied::Unauthenticated),
        }
    }
}
