// ABOUTME: Splits an app's services into stateful infrastructure and disposable application code.
// ABOUTME: Pluggable predicate chain plus primary-service selection.

use nonempty::NonEmpty;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::compose::{AppDefinition, ServiceDecl};
use crate::naming::Role;
use crate::types::ServiceName;

/// Image name fragments of stateful technologies.
pub const STATEFUL_IMAGE_PATTERNS: &[&str] = &[
    "postgres",
    "mysql",
    "mariadb",
    "mongo",
    "redis",
    "valkey",
    "keydb",
    "memcached",
    "rabbitmq",
    "kafka",
    "nats",
    "elasticsearch",
    "opensearch",
    "meilisearch",
    "timescale",
    "clickhouse",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("no application service: every service is classified as infrastructure")]
    NoApplicationService,

    #[error("configured primary service {0} is not declared")]
    UnknownPrimary(ServiceName),

    #[error("configured primary service {0} is infrastructure, not application")]
    PrimaryIsInfrastructure(ServiceName),
}

/// Decides whether a service is infrastructure.
pub trait ServicePredicate: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn is_infrastructure(&self, service: &ServiceDecl) -> bool;
}

/// Services named explicitly in `persistent_services`.
#[derive(Debug, Clone, Default)]
pub struct OverrideList(BTreeSet<ServiceName>);

impl OverrideList {
    pub fn new(names: impl IntoIterator<Item = ServiceName>) -> Self {
        Self(names.into_iter().collect())
    }
}

impl ServicePredicate for OverrideList {
    fn name(&self) -> &str {
        "persistent_services"
    }

    fn is_infrastructure(&self, service: &ServiceDecl) -> bool {
        self.0.contains(&service.name)
    }
}

/// Externally sourced images whose name contains a stateful-technology fragment.
#[derive(Debug, Clone)]
pub struct ImagePatterns(Vec<String>);

impl ImagePatterns {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(
            patterns
                .into_iter()
                .map(|p| p.into().to_ascii_lowercase())
                .collect(),
        )
    }
}

impl Default for ImagePatterns {
    fn default() -> Self {
        Self::new(STATEFUL_IMAGE_PATTERNS.iter().copied())
    }
}

impl ServicePredicate for ImagePatterns {
    fn name(&self) -> &str {
        "image pattern"
    }

    fn is_infrastructure(&self, service: &ServiceDecl) -> bool {
        if !service.is_external() {
            return false;
        }
        service
            .image_name()
            .is_some_and(|name| self.0.iter().any(|p| name.contains(p.as_str())))
    }
}

/// Result of classifying one definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    infrastructure: BTreeSet<ServiceName>,
    application: NonEmpty<ServiceName>,
    primary: ServiceName,
}

impl Classification {
    pub fn infrastructure(&self) -> &BTreeSet<ServiceName> {
        &self.infrastructure
    }

    /// Application services in declaration order.
    pub fn application(&self) -> &NonEmpty<ServiceName> {
        &self.application
    }

    /// The application service that receives the allocated port.
    pub fn primary(&self) -> &ServiceName {
        &self.primary
    }

    pub fn role_of(&self, service: &ServiceName) -> Option<Role> {
        if self.infrastructure.contains(service) {
            Some(Role::Infrastructure)
        } else if self.application.iter().any(|s| s == service) {
            Some(Role::Application)
        } else {
            None
        }
    }
}

/// Ordered chain of predicates; the first match makes a service infrastructure.
pub struct Classifier {
    predicates: Vec<Box<dyn ServicePredicate>>,
}

impl Classifier {
    /// Override list first, then the built-in image patterns.
    pub fn new(persistent_services: &[ServiceName]) -> Self {
        Self {
            predicates: vec![
                Box::new(OverrideList::new(persistent_services.iter().cloned())),
                Box::new(ImagePatterns::default()),
            ],
        }
    }

    /// Append another predicate after the built-in ones.
    pub fn with_predicate(mut self, predicate: Box<dyn ServicePredicate>) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn role_of(&self, service: &ServiceDecl) -> Role {
        match self.predicates.iter().find(|p| p.is_infrastructure(service)) {
            Some(predicate) => {
                tracing::debug!(service = %service.name, by = predicate.name(), "infrastructure");
                Role::Infrastructure
            }
            None => Role::Application,
        }
    }

    /// Partition the definition and pick the primary application service.
    ///
    /// Primary: the configured `preferred` service, else the first application
    /// service whose name contains "web", else the first application service.
    pub fn classify(
        &self,
        definition: &AppDefinition,
        preferred: Option<&ServiceName>,
    ) -> Result<Classification, ClassifyError> {
        let mut infrastructure = BTreeSet::new();
        let mut application = Vec::new();

        for service in &definition.services {
            match self.role_of(service) {
                Role::Infrastructure => {
                    infrastructure.insert(service.name.clone());
                }
                Role::Application => application.push(service.name.clone()),
            }
        }

        let application =
            NonEmpty::from_vec(application).ok_or(ClassifyError::NoApplicationService)?;

        let primary = match preferred {
            Some(name) if application.iter().any(|s| s == name) => name.clone(),
            Some(name) if infrastructure.contains(name) => {
                return Err(ClassifyError::PrimaryIsInfrastructure(name.clone()));
            }
            Some(name) => return Err(ClassifyError::UnknownPrimary(name.clone())),
            None => application
                .iter()
                .find(|s| s.as_str().contains("web"))
                .unwrap_or(application.first())
                .clone(),
        };

        tracing::info!(
            infrastructure = ?infrastructure.iter().map(ServiceName::as_str).collect::<Vec<_>>(),
            application = ?application.iter().map(ServiceName::as_str).collect::<Vec<_>>(),
            primary = %primary,
            "classified services"
        );

        Ok(Classification {
            infrastructure,
            application,
            primary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ServiceName {
        ServiceName::new(s).unwrap()
    }

    fn definition(services: Vec<ServiceDecl>) -> AppDefinition {
        AppDefinition {
            method: crate::compose::BuildMethod::Compose {
                file: "docker-compose.yml".to_string(),
            },
            services,
        }
    }

    #[test]
    fn tagged_and_untagged_postgres_are_infrastructure() {
        let classifier = Classifier::new(&[]);
        for image in ["postgres", "postgres:15", "docker.io/library/postgres:16-alpine"] {
            let svc = ServiceDecl::from_image(name("db"), image);
            assert_eq!(classifier.role_of(&svc), Role::Infrastructure, "{image}");
        }
    }

    #[test]
    fn built_service_is_application_even_with_matching_image() {
        let mut svc = ServiceDecl::from_image(name("api"), "myorg/redis-gateway");
        svc.builds = true;
        assert_eq!(Classifier::new(&[]).role_of(&svc), Role::Application);
    }

    #[test]
    fn pattern_matches_repository_not_tag() {
        let svc = ServiceDecl::from_image(name("proxy"), "nginx:postgres-compat");
        assert_eq!(Classifier::new(&[]).role_of(&svc), Role::Application);
    }

    #[test]
    fn override_list_wins() {
        let svc = ServiceDecl::from_image(name("search"), "typesense/typesense:0.25");
        let classifier = Classifier::new(&[name("search")]);
        assert_eq!(classifier.role_of(&svc), Role::Infrastructure);
    }

    #[test]
    fn web_is_primary_by_name() {
        let def = definition(vec![
            ServiceDecl::built(name("worker")),
            ServiceDecl::built(name("webapp")),
            ServiceDecl::from_image(name("db"), "postgres:15"),
        ]);
        let c = Classifier::new(&[]).classify(&def, None).unwrap();
        assert_eq!(c.primary().as_str(), "webapp");
        assert_eq!(c.infrastructure().len(), 1);
        assert_eq!(c.application().len(), 2);
    }

    #[test]
    fn first_application_service_is_primary_without_web() {
        let def = definition(vec![
            ServiceDecl::from_image(name("cache"), "redis:7"),
            ServiceDecl::built(name("api")),
            ServiceDecl::built(name("worker")),
        ]);
        let c = Classifier::new(&[]).classify(&def, None).unwrap();
        assert_eq!(c.primary().as_str(), "api");
    }

    #[test]
    fn configured_primary_wins() {
        let def = definition(vec![
            ServiceDecl::built(name("web")),
            ServiceDecl::built(name("frontend")),
        ]);
        let c = Classifier::new(&[])
            .classify(&def, Some(&name("frontend")))
            .unwrap();
        assert_eq!(c.primary().as_str(), "frontend");
    }

    #[test]
    fn configured_primary_must_be_application() {
        let def = definition(vec![
            ServiceDecl::built(name("web")),
            ServiceDecl::from_image(name("db"), "mysql:8"),
        ]);
        let classifier = Classifier::new(&[]);
        assert_eq!(
            classifier.classify(&def, Some(&name("db"))),
            Err(ClassifyError::PrimaryIsInfrastructure(name("db")))
        );
        assert_eq!(
            classifier.classify(&def, Some(&name("nope"))),
            Err(ClassifyError::UnknownPrimary(name("nope")))
        );
    }

    #[test]
    fn all_infrastructure_is_rejected() {
        let def = definition(vec![ServiceDecl::from_image(name("db"), "postgres")]);
        assert_eq!(
            Classifier::new(&[]).classify(&def, None),
            Err(ClassifyError::NoApplicationService)
        );
    }

    #[test]
    fn extra_predicate_runs_after_builtins() {
        struct NamedJobs;
        impl ServicePredicate for NamedJobs {
            fn name(&self) -> &str {
                "jobs"
            }
            fn is_infrastructure(&self, service: &ServiceDecl) -> bool {
                service.name.as_str().ends_with("-jobs")
            }
        }

        let classifier = Classifier::new(&[]).with_predicate(Box::new(NamedJobs));
        assert_eq!(
            classifier.role_of(&ServiceDecl::built(name("mail-jobs"))),
            Role::Infrastructure
        );
    }
}
