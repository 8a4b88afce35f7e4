// ABOUTME: Deploy target and push trigger parsing.
// ABOUTME: A target is (app, domain, branch); a push is one post-receive line.

use crate::types::{AppName, AppNameError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error(transparent)]
    App(#[from] AppNameError),

    #[error("invalid domain: {0}")]
    Domain(String),

    #[error("branch cannot be empty")]
    EmptyBranch,
}

/// Where pushes for one application are deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub app: AppName,
    pub domain: String,
    pub branch: String,
}

impl DeployTarget {
    pub fn new(app: &str, domain: &str, branch: &str) -> Result<Self, TargetError> {
        let app = AppName::new(app)?;
        let domain = parse_domain(domain)?;

        let branch = branch.trim();
        if branch.is_empty() {
            return Err(TargetError::EmptyBranch);
        }

        Ok(Self {
            app,
            domain,
            branch: branch.trim_start_matches("refs/heads/").to_string(),
        })
    }
}

/// A domain as it may appear as a Caddy site address.
pub fn parse_domain(domain: &str) -> Result<String, TargetError> {
    let domain = domain.trim();
    if domain.is_empty()
        || domain
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | '"' | '#'))
    {
        return Err(TargetError::Domain(domain.to_string()));
    }
    Ok(domain.to_string())
}

#[derive(Debug, Error)]
pub enum PushRefError {
    #[error("expected '<old> <new> <ref>', got: {0:?}")]
    Malformed(String),
}

/// One `(old, new, ref)` triple as Git passes it to a post-receive hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRef {
    pub old: String,
    pub new: String,
    pub refname: String,
}

impl PushRef {
    pub fn new(old: &str, new: &str, refname: &str) -> Self {
        Self {
            old: old.to_string(),
            new: new.to_string(),
            refname: refname.to_string(),
        }
    }

    pub fn parse_line(line: &str) -> Result<Self, PushRefError> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(old), Some(new), Some(refname), None) => Ok(Self::new(old, new, refname)),
            _ => Err(PushRefError::Malformed(line.to_string())),
        }
    }

    /// Branch name if the ref is a branch head.
    pub fn branch(&self) -> Option<&str> {
        self.refname.strip_prefix("refs/heads/")
    }

    /// Whether this push updates the branch the target deploys from.
    pub fn targets(&self, target: &DeployTarget) -> bool {
        self.branch() == Some(target.branch.as_str())
    }

    /// A push of the all-zero revision deletes the branch.
    pub fn is_deletion(&self) -> bool {
        !self.new.is_empty() && self.new.chars().all(|c| c == '0')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_strips_ref_prefix_from_branch() {
        let target = DeployTarget::new("shop", "shop.example.com", "refs/heads/main").unwrap();
        assert_eq!(target.branch, "main");
    }

    #[test]
    fn target_rejects_domain_that_breaks_route_syntax() {
        assert!(matches!(
            DeployTarget::new("shop", "a.com {", "main"),
            Err(TargetError::Domain(_))
        ));
        assert!(matches!(
            DeployTarget::new("shop", "", "main"),
            Err(TargetError::Domain(_))
        ));
    }

    #[test]
    fn parses_post_receive_line() {
        let push = PushRef::parse_line("0000 a1b2c3d refs/heads/main\n").unwrap();
        assert_eq!(push.new, "a1b2c3d");
        assert_eq!(push.branch(), Some("main"));
    }

    #[test]
    fn rejects_malformed_line() {
        assert!(PushRef::parse_line("a1b2c3d refs/heads/main").is_err());
        assert!(PushRef::parse_line("a b c d").is_err());
    }

    #[test]
    fn tag_push_does_not_target_branch() {
        let target = DeployTarget::new("shop", "shop.example.com", "main").unwrap();
        let push = PushRef::new("0", "a1b2c3d", "refs/tags/main");
        assert!(!push.targets(&target));
    }

    #[test]
    fn zero_revision_is_deletion() {
        assert!(PushRef::new("a1b2c3d", "0000000", "refs/heads/main").is_deletion());
        assert!(!PushRef::new("0000000", "a1b2c3d", "refs/heads/main").is_deletion());
    }
}
