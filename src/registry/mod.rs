// ABOUTME: Release history: the deployment manifest, revision-tagged images, and checkouts.
// ABOUTME: Everything rollback needs to decide which versions are restorable.

pub mod checkouts;
pub mod images;
mod manifest;

pub use images::GcPolicy;
pub use manifest::{Manifest, ManifestError, Release, ReleaseMethod, TIMESTAMP_FORMAT};
