// ABOUTME: Container engine access for the deployment engine.
// ABOUTME: Capability traits plus the bollard and docker CLI backed implementation.

mod bollard;
mod compose;
mod error;
mod traits;

pub use self::bollard::BollardRuntime;
pub use compose::DockerCli;
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
