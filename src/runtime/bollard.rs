// ABOUTME: Bollard-based implementation of the runtime capability traits.
// ABOUTME: Talks to the local Docker socket; compose and build cache go through the docker CLI.

use async_trait::async_trait;
use bollard::Docker;
use bollard::query_parameters::{
    InspectNetworkOptions, ListContainersOptions, ListImagesOptions, PruneImagesOptions,
    RemoveContainerOptions, RemoveImageOptions, StopContainerOptions, TagImageOptions,
};
use chrono::{DateTime, Utc};
use snafu::ResultExt;
use std::collections::HashMap;
use std::time::Duration;

use super::compose::DockerCli;
use super::error::{ConnectSnafu, PingSnafu, RuntimeError};
use super::traits::{
    ComposeError, ComposeOps, ComposeUp, ContainerError, ContainerFilters, ContainerOps,
    ContainerSummary, ImageError, ImageOps, ImageSummary, NetworkConfig, NetworkError, NetworkOps,
};
use crate::types::{ContainerId, ImageRef, NetworkId};

// =============================================================================
// Error Mapping Helpers
// =============================================================================

/// HTTP status and message of an engine-side error response.
fn engine_status(e: &bollard::errors::Error) -> Option<(u16, &str)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.as_str())),
        _ => None,
    }
}

fn container_error(e: bollard::errors::Error) -> ContainerError {
    match engine_status(&e) {
        Some((404, message)) => ContainerError::NotFound(message.to_string()),
        Some((304, message)) => ContainerError::NotRunning(message.to_string()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn image_error(e: bollard::errors::Error, action: &str, image: &str) -> ImageError {
    match engine_status(&e) {
        Some((404, _)) => ImageError::NotFound(image.to_string()),
        Some((409, _)) => ImageError::InUse(image.to_string()),
        _ => ImageError::Runtime(format!("failed to {} {}: {}", action, image, e)),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container engine on the local host.
pub struct BollardRuntime {
    client: Docker,
    cli: DockerCli,
}

impl BollardRuntime {
    pub fn new(client: Docker, cli: DockerCli) -> Self {
        Self { client, cli }
    }

    /// Connect through `DOCKER_HOST` or the default local socket and ping it.
    pub async fn connect_local() -> Result<Self, RuntimeError> {
        let client = Docker::connect_with_local_defaults().context(ConnectSnafu)?;
        client.ping().await.context(PingSnafu)?;
        Ok(Self::new(client, DockerCli::default()))
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{}={}", key, value));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(container_error)?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();

                ContainerSummary {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    name,
                    image: c.image.unwrap_or_default(),
                    state: c
                        .state
                        .map(|s| format!("{:?}", s).to_lowercase())
                        .unwrap_or_default(),
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(container_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            v: false,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(container_error)
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn list_images(&self, pattern: &str) -> Result<Vec<ImageSummary>, ImageError> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![pattern.to_string()]);

        let opts = ListImagesOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let images = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(|e| ImageError::Runtime(e.to_string()))?;

        Ok(images
            .into_iter()
            .map(|image| ImageSummary {
                id: image.id,
                tags: image
                    .repo_tags
                    .iter()
                    .filter(|t| t.as_str() != "<none>:<none>")
                    .filter_map(|t| ImageRef::parse(t).ok())
                    .collect(),
                created: DateTime::<Utc>::from_timestamp(image.created, 0).unwrap_or_default(),
            })
            .collect())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();

        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(engine_status(&e), Some((404, _))) => Ok(false),
            Err(e) => Err(image_error(e, "inspect", &image_name)),
        }
    }

    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError> {
        let source_name = source.to_string();
        let repo = match target.registry() {
            Some(registry) => format!("{}/{}", registry, target.name()),
            None => target.name().to_string(),
        };

        let opts = TagImageOptions {
            repo: Some(repo),
            tag: target.tag().map(str::to_string),
            ..Default::default()
        };

        self.client
            .tag_image(&source_name, Some(opts))
            .await
            .map_err(|e| image_error(e, "tag", &source_name))
    }

    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), ImageError> {
        let image_name = reference.to_string();

        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_image(&image_name, Some(opts), None)
            .await
            .map_err(|e| image_error(e, "remove", &image_name))?;

        Ok(())
    }

    async fn prune_dangling(&self, older_than: Duration) -> Result<(), ImageError> {
        let mut filters = HashMap::new();
        filters.insert("dangling".to_string(), vec!["true".to_string()]);
        filters.insert(
            "until".to_string(),
            vec![format!("{}s", older_than.as_secs())],
        );

        let report = self
            .client
            .prune_images(Some(PruneImagesOptions {
                filters: Some(filters),
                ..Default::default()
            }))
            .await
            .map_err(|e| ImageError::Runtime(format!("image prune failed: {}", e)))?;

        tracing::debug!(
            reclaimed = report.space_reclaimed.unwrap_or_default(),
            "pruned dangling images"
        );
        Ok(())
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let opts = bollard::models::NetworkCreateRequest {
            name: config.name.clone(),
            driver: config.driver.clone(),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        let response = self
            .client
            .create_network(opts)
            .await
            .map_err(|e| match engine_status(&e) {
                Some((409, message)) => NetworkError::AlreadyExists(message.to_string()),
                _ => NetworkError::Runtime(e.to_string()),
            })?;

        Ok(NetworkId::new(response.id))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(name, None::<InspectNetworkOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if matches!(engine_status(&e), Some((404, _))) => Ok(false),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }
}

#[async_trait]
impl ComposeOps for BollardRuntime {
    async fn compose_up(&self, request: &ComposeUp) -> Result<(), ComposeError> {
        self.cli.compose_up(request).await
    }

    async fn prune_build_cache(&self, older_than: Duration) -> Result<(), ComposeError> {
        self.cli
            .builder_prune(&format!("{}s", older_than.as_secs()))
            .await
    }
}
