//! Account identifier type
//!
//! A [`UserId`] is the permalink a directory uses to name an account. Two ids
//! are equal only when their strings are byte-for-byte equal: there is no case
//! folding and no alias resolution.
//!
//! Ids arriving from a directory page may be *blank*. A blank id is the
//! placeholder left in a followings slot the directory never filled; it is
//! never a node and never the end of an edge.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a social-network account.
///
/// # Examples
///
/// ```
/// use cumuli::UserId;
///
/// let user = UserId::parse("forss").unwrap();
/// assert_eq!(user.as_str(), "forss");
/// assert!(UserId::parse("two words").is_err());
/// assert!(UserId::blank().is_blank());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a directory-supplied identifier without validation.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Validates a caller-supplied identifier.
    ///
    /// Input ids must be non-empty and free of whitespace, since request keys
    /// are formed by joining ids with spaces. The relative path names `.` and
    /// `..` cannot address an account and are rejected too.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidInput("user id is empty".to_string()));
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(Error::InvalidInput(format!(
                "user id {raw:?} contains whitespace"
            )));
        }
        if raw == "." || raw == ".." {
            return Err(Error::InvalidInput(format!(
                "user id {raw:?} is a relative path name"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    /// The placeholder for an unfilled followings slot.
    pub fn blank() -> Self {
        Self(String::new())
    }

    /// Returns true for the unfilled-slot placeholder.
    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Checks a requested user set before anything is fetched.
///
/// The set must be non-empty, every id must pass [`UserId::parse`] and no id
/// may appear twice.
pub fn validate_users(users: &[UserId]) -> Result<()> {
    if users.is_empty() {
        return Err(Error::InvalidInput("no users requested".to_string()));
    }

    let mut distinct = std::collections::HashSet::with_capacity(users.len());
    for user in users {
        UserId::parse(user.as_str())?;
        if !distinct.insert(user.as_str()) {
            return Err(Error::InvalidInput(format!("user {user} requested twice")));
        }
    }
    Ok(())
}

impl Borrow<str> for UserId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
