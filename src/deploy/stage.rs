// ABOUTME: Named pipeline stages and the reporter that receives progress.
// ABOUTME: Failures are attributed to the stage they happened in.

use std::fmt;

/// One step of the deploy or rollback pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidateBranch,
    AllocatePort,
    Checkout,
    LoadEnvironment,
    ClassifyServices,
    BuildAndStart,
    StartCached,
    HealthCheck,
    RollbackNewContainer,
    CutOver,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ValidateBranch => "validate branch",
            Stage::AllocatePort => "allocate port",
            Stage::Checkout => "checkout",
            Stage::LoadEnvironment => "load environment",
            Stage::ClassifyServices => "classify services",
            Stage::BuildAndStart => "build and start",
            Stage::StartCached => "start cached image",
            Stage::HealthCheck => "health check",
            Stage::RollbackNewContainer => "remove new containers",
            Stage::CutOver => "cut over",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives pipeline progress.
pub trait Reporter {
    /// A stage is about to run.
    fn stage(&self, stage: Stage);

    /// Free-form progress detail.
    fn note(&self, message: &str);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct Silent;

impl Reporter for Silent {
    fn stage(&self, _stage: Stage) {}

    fn note(&self, _message: &str) {}
}
