// ABOUTME: Application-wide error types for mushak.
// ABOUTME: Uses thiserror for ergonomic error handling.

use thiserror::Error;

use crate::config::{PushRefError, TargetError};
use crate::deploy::{DeployError, Stage};
use crate::proxy::ProxyError;
use crate::runtime::RuntimeError;
use crate::types::AppNameError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: DeployError,
    },

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("invalid app name: {0}")]
    App(#[from] AppNameError),

    #[error("invalid deploy target: {0}")]
    Target(#[from] TargetError),

    #[error(transparent)]
    PushRef(#[from] PushRefError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The underlying deployment error, wherever it was raised.
    pub fn deploy_error(&self) -> Option<&DeployError> {
        match self {
            Error::Stage { source, .. } => Some(source),
            Error::Deploy(e) => Some(e),
            _ => None,
        }
    }

    /// Stage that failed, if the error came out of the pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
