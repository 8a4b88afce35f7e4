// ABOUTME: Version-scoped names minted for one release.
// ABOUTME: Only constructible from a finished classification, so names never precede it.

use crate::classify::Classification;
use crate::naming;
use crate::types::{AppName, ImageRef, Revision, ServiceName};

/// Names of everything one release creates in the container engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseIdentity {
    app: AppName,
    revision: Revision,
    project: String,
    network: String,
    image: ImageRef,
    classification: Classification,
}

impl ReleaseIdentity {
    pub fn mint(app: &AppName, revision: &Revision, classification: Classification) -> Self {
        Self {
            app: app.clone(),
            revision: revision.clone(),
            project: naming::release_project(app, revision),
            network: naming::network_name(app),
            image: naming::release_image(app, revision),
            classification,
        }
    }

    pub fn app(&self) -> &AppName {
        &self.app
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    /// Compose project of this release's application services.
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// `mushak-<app>:<revision>`, the image the primary runs.
    pub fn image(&self) -> &ImageRef {
        &self.image
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn primary(&self) -> &ServiceName {
        self.classification.primary()
    }

    pub fn container_name(&self, service: &ServiceName) -> String {
        naming::release_container(&self.app, &self.revision, service)
    }

    pub fn primary_container(&self) -> String {
        self.container_name(self.primary())
    }

    /// Container names of every application service of this release.
    pub fn application_containers(&self) -> Vec<String> {
        self.classification
            .application()
            .iter()
            .map(|service| self.container_name(service))
            .collect()
    }
}
