// ABOUTME: Short content-addressed revision identifier.
// ABOUTME: Names checkout directories, image tags, and manifest entries.

use std::fmt;
use thiserror::Error;

/// Number of characters kept when abbreviating a full commit hash.
pub const SHORT_LEN: usize = 7;

#[derive(Debug, Error)]
pub enum RevisionError {
    #[error("revision cannot be empty")]
    Empty,

    #[error("revision exceeds maximum length of 64 characters")]
    TooLong,

    #[error("invalid character in revision: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(String);

impl Revision {
    /// Accepts lowercase alphanumerics only, so a revision is always safe as
    /// a path component, an image tag and part of a compose project name.
    pub fn new(value: &str) -> Result<Self, RevisionError> {
        if value.is_empty() {
            return Err(RevisionError::Empty);
        }
        if value.len() > 64 {
            return Err(RevisionError::TooLong);
        }
        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit())
        {
            return Err(RevisionError::InvalidChar(c));
        }
        Ok(Self(value.to_string()))
    }

    /// Parse and abbreviate to the first seven characters.
    pub fn abbreviate(value: &str) -> Result<Self, RevisionError> {
        let full = Self::new(value.trim())?;
        Ok(Self(full.0.chars().take(SHORT_LEN).collect()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Revision {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviates_full_hash() {
        let rev = Revision::abbreviate("a1b2c3d4e5f60718293a4b5c6d7e8f9012345678").unwrap();
        assert_eq!(rev.as_str(), "a1b2c3d");
    }

    #[test]
    fn short_input_is_kept() {
        assert_eq!(Revision::abbreviate("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn rejects_path_like_values() {
        assert!(matches!(Revision::new(""), Err(RevisionError::Empty)));
        assert!(matches!(
            Revision::new("../etc"),
            Err(RevisionError::InvalidChar('.'))
        ));
        assert!(matches!(
            Revision::new("ABC"),
            Err(RevisionError::InvalidChar('A'))
        ));
    }
}
