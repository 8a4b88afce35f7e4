// ABOUTME: Container operations trait for the container engine.
// ABOUTME: List, stop, and remove managed containers.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::naming::{LABEL_APP, LABEL_MANAGED, LABEL_PRIMARY, LABEL_REVISION, LABEL_ROLE, Role};
use crate::types::{AppName, ContainerId, Revision};

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Stop a running container.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError>;

    /// Remove a container. Named volumes are never removed.
    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: HashMap<String, String>,
    /// Filter by name (partial match).
    pub name: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    /// Every managed container of an app.
    pub fn for_app(app: &AppName, all: bool) -> Self {
        let mut labels = HashMap::new();
        labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
        labels.insert(LABEL_APP.to_string(), app.to_string());
        Self {
            labels,
            all,
            ..Default::default()
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.labels
            .insert(LABEL_ROLE.to_string(), role.as_str().to_string());
        self
    }

    pub fn revision(mut self, revision: &Revision) -> Self {
        self.labels
            .insert(LABEL_REVISION.to_string(), revision.to_string());
        self
    }

    pub fn primary(mut self) -> Self {
        self.labels
            .insert(LABEL_PRIMARY.to_string(), "true".to_string());
        self
    }

    /// Whether a container carrying `labels` passes these label filters.
    pub fn matches_labels(&self, labels: &HashMap<String, String>) -> bool {
        self.labels
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

/// Summary information about a container.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    /// Lowercase engine state (`running`, `exited`, ...).
    pub state: String,
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
