// ABOUTME: Generates the compose override files that pin engine identities onto services.
// ABOUTME: Container names, labels, the primary's port, the release image, and the shared network.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{AppDefinition, BuildMethod};
use crate::deploy::ReleaseIdentity;
use crate::naming::{self, LABEL_PRIMARY, Role};
use crate::types::{AppName, ServiceName};

/// Whether application images are built or taken from the revision tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    Build,
    Cached,
}

#[derive(Debug, Serialize)]
struct ComposeOverride {
    services: BTreeMap<String, ServiceOverride>,
    networks: BTreeMap<String, ExternalNetwork>,
}

#[derive(Debug, Serialize)]
struct ServiceOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    container_name: String,
    labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ExternalNetwork {
    name: String,
    external: bool,
}

fn shared_network(app: &AppName) -> BTreeMap<String, ExternalNetwork> {
    let mut networks = BTreeMap::new();
    networks.insert(
        "default".to_string(),
        ExternalNetwork {
            name: naming::network_name(app),
            external: true,
        },
    );
    networks
}

/// Override for the application services of one release.
///
/// The primary publishes `host_port:internal_port` and runs the revision
/// image. Non-primary built services keep compose's default image name,
/// which is `<project>-<service>`.
pub fn render_release(
    identity: &ReleaseIdentity,
    definition: &AppDefinition,
    services: &[ServiceName],
    host_port: u16,
    internal_port: u16,
    mode: StartMode,
) -> Result<String, serde_yaml::Error> {
    let mut rendered = BTreeMap::new();

    for service in services {
        let is_primary = service == identity.primary();
        let builds = definition.service(service).is_some_and(|s| s.builds);

        let mut labels = naming::labels(
            identity.app(),
            Role::Application,
            service,
            Some(identity.revision()),
        );
        let mut ports = Vec::new();
        let mut image = None;
        let mut build = None;

        if is_primary {
            labels.insert(LABEL_PRIMARY.to_string(), "true".to_string());
            ports.push(format!("{}:{}", host_port, internal_port));
            if builds || mode == StartMode::Cached {
                image = Some(identity.image().to_string());
            }
        }

        if definition.method == BuildMethod::Dockerfile && mode == StartMode::Build {
            build = Some(".".to_string());
        }

        rendered.insert(
            service.to_string(),
            ServiceOverride {
                build,
                image,
                container_name: identity.container_name(service),
                labels,
                ports,
            },
        );
    }

    serde_yaml::to_string(&ComposeOverride {
        services: rendered,
        networks: shared_network(identity.app()),
    })
}

/// Override for the long-lived infrastructure project of an app.
pub fn render_infrastructure(
    app: &AppName,
    services: &[ServiceName],
) -> Result<String, serde_yaml::Error> {
    let rendered = services
        .iter()
        .map(|service| {
            (
                service.to_string(),
                ServiceOverride {
                    build: None,
                    image: None,
                    container_name: naming::infra_container(app, service),
                    labels: naming::labels(app, Role::Infrastructure, service, None),
                    ports: Vec::new(),
                },
            )
        })
        .collect();

    serde_yaml::to_string(&ComposeOverride {
        services: rendered,
        networks: shared_network(app),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::compose::ServiceDecl;
    use crate::types::Revision;
    use serde_yaml::Value;

    fn name(s: &str) -> ServiceName {
        ServiceName::new(s).unwrap()
    }

    fn compose_definition() -> AppDefinition {
        AppDefinition::from_compose_yaml(
            "docker-compose.yml",
            "services:\n  web:\n    build: .\n  worker:\n    build: .\n  db:\n    image: postgres:15\n",
        )
        .unwrap()
    }

    fn identity(definition: &AppDefinition) -> ReleaseIdentity {
        let classification = Classifier::new(&[]).classify(definition, None).unwrap();
        ReleaseIdentity::mint(
            &AppName::new("shop").unwrap(),
            &Revision::new("a1b2c3d").unwrap(),
            classification,
        )
    }

    #[test]
    fn primary_gets_port_image_and_label() {
        let def = compose_definition();
        let id = identity(&def);
        let yaml = render_release(&id, &def, &[name("web"), name("worker")], 8042, 3000, StartMode::Build)
            .unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();

        let web = &doc["services"]["web"];
        assert_eq!(web["container_name"], "mushak-shop-a1b2c3d-web");
        assert_eq!(web["image"], "mushak-shop:a1b2c3d");
        assert_eq!(web["ports"][0], "8042:3000");
        assert_eq!(web["labels"]["mushak.primary"], "true");
        assert!(web.get("build").is_none());

        let worker = &doc["services"]["worker"];
        assert_eq!(worker["container_name"], "mushak-shop-a1b2c3d-worker");
        assert!(worker.get("image").is_none());
        assert!(worker.get("ports").is_none());
        assert_eq!(worker["labels"]["mushak.revision"], "a1b2c3d");

        assert_eq!(doc["networks"]["default"]["name"], "mushak-shop-net");
        assert_eq!(doc["networks"]["default"]["external"], true);
    }

    #[test]
    fn dockerfile_release_builds_from_checkout_root() {
        let def = AppDefinition::dockerfile().unwrap();
        let id = identity(&def);

        let yaml = render_release(&id, &def, &[name("web")], 8000, 80, StartMode::Build).unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(doc["services"]["web"]["build"], ".");

        let yaml = render_release(&id, &def, &[name("web")], 8000, 80, StartMode::Cached).unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();
        assert!(doc["services"]["web"].get("build").is_none());
        assert_eq!(doc["services"]["web"]["image"], "mushak-shop:a1b2c3d");
    }

    #[test]
    fn external_primary_keeps_its_image_when_building() {
        let def = AppDefinition {
            method: BuildMethod::Compose {
                file: "docker-compose.yml".to_string(),
            },
            services: vec![ServiceDecl::from_image(name("web"), "nginx:1.27")],
        };
        let id = identity(&def);
        let yaml = render_release(&id, &def, &[name("web")], 8000, 80, StartMode::Build).unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();
        assert!(doc["services"]["web"].get("image").is_none());
    }

    #[test]
    fn infrastructure_uses_stable_names() {
        let app = AppName::new("shop").unwrap();
        let yaml = render_infrastructure(&app, &[name("db")]).unwrap();
        let doc: Value = serde_yaml::from_str(&yaml).unwrap();
        let db = &doc["services"]["db"];
        assert_eq!(db["container_name"], "mushak-shop-infra-db");
        assert_eq!(db["labels"]["mushak.role"], "infrastructure");
        assert!(db["labels"].get("mushak.revision").is_none());
    }
}
