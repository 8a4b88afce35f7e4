// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

/// Collects non-fatal warnings during deployment operations.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a lock release warning.
    pub fn lock_release(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LockRelease, message)
    }

    pub fn environment(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Environment, message)
    }

    pub fn definition(message: impl Into<String>) -> Self {
        Self::new(WarningKind::Definition, message)
    }

    pub fn active_release(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ActiveRelease, message)
    }

    pub fn container_cleanup(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ContainerCleanup, message)
    }

    pub fn checkout_prune(message: impl Into<String>) -> Self {
        Self::new(WarningKind::CheckoutPrune, message)
    }

    pub fn image_tag(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ImageTag, message)
    }

    pub fn image_gc(message: impl Into<String>) -> Self {
        Self::new(WarningKind::ImageGc, message)
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Failed to release deploy lock (lock file may remain).
    LockRelease,
    /// No environment file to copy into the checkout.
    Environment,
    /// Part of the application definition was overridden by the engine.
    Definition,
    /// The `current` pointer could not be switched.
    ActiveRelease,
    /// Old release containers could not be stopped or removed.
    ContainerCleanup,
    /// Old checkout directories could not be deleted.
    CheckoutPrune,
    /// The serving image could not be tagged.
    ImageTag,
    /// Image or cache garbage collection failed.
    ImageGc,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::lock_release("failed to remove lock file"));
        diag.warn(Warning::image_gc("prune failed"));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        assert_eq!(Warning::lock_release("x").kind, WarningKind::LockRelease);
        assert_eq!(Warning::environment("x").kind, WarningKind::Environment);
        assert_eq!(Warning::checkout_prune("x").kind, WarningKind::CheckoutPrune);
    }
}
