// ABOUTME: Validated domain types shared across the engine.
// ABOUTME: Names, revisions, image references, and phantom-typed runtime IDs.

mod app_name;
mod id;
mod image_ref;
mod revision;
mod service_name;

pub use app_name::{AppName, AppNameError};
pub use id::{ContainerId, NetworkId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use revision::{Revision, RevisionError};
pub use service_name::{ServiceName, ServiceNameError};
