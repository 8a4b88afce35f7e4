// ABOUTME: Reads an application's multi-service definition from its checkout.
// ABOUTME: Detects compose files or a lone Dockerfile and keeps services in declaration order.

mod render;

pub use render::{StartMode, render_infrastructure, render_release};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{ImageRef, ServiceName, ServiceNameError};

pub const COMPOSE_FILES: [&str; 2] = ["docker-compose.yml", "docker-compose.yaml"];
pub const DOCKERFILE: &str = "Dockerfile";

/// Override file generated next to the base file for each release.
pub const RELEASE_OVERRIDE_FILE: &str = "docker-compose.mushak.yml";
/// Override file generated for the long-lived infrastructure project.
pub const INFRA_OVERRIDE_FILE: &str = "docker-compose.mushak-infra.yml";

/// Service synthesized for Dockerfile-only projects.
pub const DOCKERFILE_SERVICE: &str = "web";

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("no docker-compose.yml, docker-compose.yaml or Dockerfile in {0}")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid compose file {file}: {source}")]
    Parse {
        file: String,
        source: serde_yaml::Error,
    },

    #[error("invalid service name {name:?}: {source}")]
    ServiceName {
        name: String,
        source: ServiceNameError,
    },

    #[error("compose file {0} declares no services")]
    NoServices(String),
}

/// How a release is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMethod {
    /// A compose file at the checkout root, by file name.
    Compose { file: String },
    /// A single Dockerfile; the engine synthesizes the compose file.
    Dockerfile,
}

/// One declared container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDecl {
    pub name: ServiceName,
    /// Image as written in the compose file.
    pub image: Option<String>,
    /// Whether the service has a build context.
    pub builds: bool,
    /// A `container_name` the engine will replace with its own identity.
    pub container_name: Option<String>,
}

impl ServiceDecl {
    pub fn built(name: ServiceName) -> Self {
        Self {
            name,
            image: None,
            builds: true,
            container_name: None,
        }
    }

    pub fn from_image(name: ServiceName, image: &str) -> Self {
        Self {
            name,
            image: Some(image.to_string()),
            builds: false,
            container_name: None,
        }
    }

    /// Image pulled from elsewhere rather than built from the checkout.
    pub fn is_external(&self) -> bool {
        !self.builds && self.image.is_some()
    }

    /// Lowercased repository path with registry and tag removed.
    ///
    /// Images with interpolation (`${TAG}`) do not parse; their raw text
    /// with any trailing tag cut off is used instead.
    pub fn image_name(&self) -> Option<String> {
        let raw = self.image.as_deref()?;
        let name = match ImageRef::parse(raw) {
            Ok(image) => image.name().to_string(),
            Err(_) => {
                let last_slash = raw.rfind('/').map(|i| i + 1).unwrap_or(0);
                match raw[last_slash..].find(':') {
                    Some(colon) => raw[..last_slash + colon].to_string(),
                    None => raw.to_string(),
                }
            }
        };
        Some(name.to_ascii_lowercase())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawService {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    build: Option<serde_yaml::Value>,
    #[serde(default)]
    container_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCompose {
    #[serde(default)]
    services: Option<serde_yaml::Mapping>,
}

/// The services of one release and how they are built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDefinition {
    pub method: BuildMethod,
    pub services: Vec<ServiceDecl>,
}

impl AppDefinition {
    /// Inspect a checkout: a compose file wins over a Dockerfile.
    pub fn detect(dir: &Path) -> Result<Self, DefinitionError> {
        for file in COMPOSE_FILES {
            let path = dir.join(file);
            if path.is_file() {
                let yaml = std::fs::read_to_string(&path)
                    .map_err(|source| DefinitionError::Read { path, source })?;
                return Self::from_compose_yaml(file, &yaml);
            }
        }

        if dir.join(DOCKERFILE).is_file() {
            return Self::dockerfile();
        }

        Err(DefinitionError::Missing(dir.to_path_buf()))
    }

    pub fn dockerfile() -> Result<Self, DefinitionError> {
        let name =
            ServiceName::new(DOCKERFILE_SERVICE).map_err(|source| DefinitionError::ServiceName {
                name: DOCKERFILE_SERVICE.to_string(),
                source,
            })?;
        Ok(Self {
            method: BuildMethod::Dockerfile,
            services: vec![ServiceDecl::built(name)],
        })
    }

    pub fn from_compose_yaml(file: &str, yaml: &str) -> Result<Self, DefinitionError> {
        let raw: RawCompose = serde_yaml::from_str(yaml).map_err(|source| DefinitionError::Parse {
            file: file.to_string(),
            source,
        })?;

        let mut services = Vec::new();
        for (key, value) in raw.services.unwrap_or_default() {
            let key = match key {
                serde_yaml::Value::String(s) => s,
                other => serde_yaml::to_string(&other)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            };
            let name = ServiceName::new(&key).map_err(|source| DefinitionError::ServiceName {
                name: key.clone(),
                source,
            })?;

            let body: RawService = if value.is_null() {
                RawService::default()
            } else {
                serde_yaml::from_value(value).map_err(|source| DefinitionError::Parse {
                    file: file.to_string(),
                    source,
                })?
            };

            services.push(ServiceDecl {
                name,
                image: body.image.filter(|i| !i.trim().is_empty()),
                builds: body.build.is_some_and(|b| !b.is_null()),
                container_name: body.container_name,
            });
        }

        if services.is_empty() {
            return Err(DefinitionError::NoServices(file.to_string()));
        }

        Ok(Self {
            method: BuildMethod::Compose {
                file: file.to_string(),
            },
            services,
        })
    }

    pub fn service(&self, name: &ServiceName) -> Option<&ServiceDecl> {
        self.services.iter().find(|s| &s.name == name)
    }

    /// The base compose file inside `dir`, if the project has one.
    pub fn base_file(&self, dir: &Path) -> Option<PathBuf> {
        match &self.method {
            BuildMethod::Compose { file } => Some(dir.join(file)),
            BuildMethod::Dockerfile => None,
        }
    }
}
