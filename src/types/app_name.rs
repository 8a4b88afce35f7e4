// ABOUTME: Validated application name.
// ABOUTME: Used in compose project names, image repositories, and on-disk paths.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppNameError {
    #[error("app name cannot be empty")]
    Empty,

    #[error("app name exceeds maximum length of 48 characters")]
    TooLong,

    #[error("app name cannot start or end with a hyphen")]
    EdgeHyphen,

    #[error("app name must be lowercase")]
    NotLowercase,

    #[error("invalid character in app name: '{0}'")]
    InvalidChar(char),
}

/// Name of a deployed application (`shop`, `blog-api`).
///
/// Compose project names and image repositories must be lowercase, and the
/// name becomes a directory under the apps root, so the accepted alphabet is
/// lowercase letters, digits and inner hyphens.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }

        if value.len() > 48 {
            return Err(AppNameError::TooLong);
        }

        if value.starts_with('-') || value.ends_with('-') {
            return Err(AppNameError::EdgeHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(AppNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(AppNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AppName {
    type Err = AppNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(AppName::new("shop").is_ok());
        assert!(AppName::new("blog-api2").is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(matches!(AppName::new(""), Err(AppNameError::Empty)));
        assert!(matches!(AppName::new("Shop"), Err(AppNameError::NotLowercase)));
        assert!(matches!(AppName::new("shop-"), Err(AppNameError::EdgeHyphen)));
        assert!(matches!(AppName::new("a/b"), Err(AppNameError::InvalidChar('/'))));
    }
}
