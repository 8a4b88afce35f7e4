// ABOUTME: Naming conventions for everything the engine creates in the container engine.
// ABOUTME: Projects, containers, networks, image repositories, and ownership labels.

use std::collections::BTreeMap;

use crate::types::{AppName, ImageRef, Revision, ServiceName};

pub const LABEL_MANAGED: &str = "mushak.managed";
pub const LABEL_APP: &str = "mushak.app";
pub const LABEL_ROLE: &str = "mushak.role";
pub const LABEL_REVISION: &str = "mushak.revision";
pub const LABEL_SERVICE: &str = "mushak.service";
pub const LABEL_PRIMARY: &str = "mushak.primary";

/// Tag that always follows the serving release.
pub const LATEST_TAG: &str = "latest";

/// Segment used instead of a revision for the long-lived infrastructure project.
pub const INFRA_SEGMENT: &str = "infra";

/// `mushak-<app>`: repository holding one tag per revision.
pub fn image_repository(app: &AppName) -> String {
    format!("mushak-{}", app)
}

/// `mushak-<app>:<revision>`
pub fn release_image(app: &AppName, revision: &Revision) -> ImageRef {
    ImageRef::local(image_repository(app), revision.as_str())
}

/// `mushak-<app>-net`: shared network joining infrastructure and every release.
pub fn network_name(app: &AppName) -> String {
    format!("mushak-{}-net", app)
}

/// `mushak-<app>-<revision>`
pub fn release_project(app: &AppName, revision: &Revision) -> String {
    format!("mushak-{}-{}", app, revision)
}

/// `mushak-<app>-infra`
pub fn infra_project(app: &AppName) -> String {
    format!("mushak-{}-{}", app, INFRA_SEGMENT)
}

/// `mushak-<app>-<revision>-<service>`
pub fn release_container(app: &AppName, revision: &Revision, service: &ServiceName) -> String {
    format!("{}-{}", release_project(app, revision), service)
}

/// `mushak-<app>-infra-<service>`
pub fn infra_container(app: &AppName, service: &ServiceName) -> String {
    format!("{}-{}", infra_project(app), service)
}

/// Prefix shared by every container and per-release image of an app.
pub fn app_prefix(app: &AppName) -> String {
    format!("mushak-{}-", app)
}

/// Parse the revision out of `mushak-<app>-<revision>-...`.
///
/// Returns `None` for infrastructure names and names of other apps.
pub fn revision_from_name(app: &AppName, name: &str) -> Option<Revision> {
    let rest = name.trim_start_matches('/').strip_prefix(&app_prefix(app))?;
    let segment = rest.split('-').next()?;
    if segment == INFRA_SEGMENT {
        return None;
    }
    Revision::new(segment).ok()
}

/// Role of a managed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Infrastructure,
    Application,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Infrastructure => "infrastructure",
            Role::Application => "application",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ownership labels applied to every managed container.
pub fn labels(
    app: &AppName,
    role: Role,
    service: &ServiceName,
    revision: Option<&Revision>,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
    labels.insert(LABEL_APP.to_string(), app.to_string());
    labels.insert(LABEL_ROLE.to_string(), role.to_string());
    labels.insert(LABEL_SERVICE.to_string(), service.to_string());
    if let Some(revision) = revision {
        labels.insert(LABEL_REVISION.to_string(), revision.to_string());
    }
    labels
}
