// ABOUTME: State transition methods for deployment orchestration.
// ABOUTME: Each method consumes self and returns the next state on success.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::classify::Classifier;
use crate::compose::{self, AppDefinition, INFRA_OVERRIDE_FILE, RELEASE_OVERRIDE_FILE, StartMode};
use crate::config::{AppConfig, PushRef};
use crate::diagnostics::{Diagnostics, Warning};
use crate::health::{HealthOutcome, HealthPolicy, wait_healthy};
use crate::naming::{self, LABEL_APP, LABEL_MANAGED, LABEL_SERVICE, Role};
use crate::registry::{GcPolicy, Manifest, Release, ReleaseMethod, checkouts, images};
use crate::runtime::{
    BuildPolicy, ComposeUp, ContainerError, ContainerFilters, NetworkConfig, NetworkError,
    Runtime,
};
use crate::shutdown::Shutdown;
use crate::types::{AppName, ImageRef, ServiceName};

use super::Deployment;
use super::cleanup;
use super::error::DeployError;
use super::host::{Host, KEEP_CHECKOUTS};
use super::identity::ReleaseIdentity;
use super::pipeline::DeploySummary;
use super::state::{
    BranchValidated, CheckedOut, Classified, Completed, CutOver, EnvironmentLoaded, HealthChecked,
    Initialized, Loaded, PortAllocated, Staging, Started,
};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Deployment<T>, (Deployment<S>, DeployError)>;

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Deployment<S> {
    /// Internal helper to transition to a new state built from the old one.
    fn map_state<T>(self, f: impl FnOnce(S) -> T) -> Deployment<T> {
        let state = f(self.state);
        Deployment {
            target: self.target,
            method: self.method,
            state,
        }
    }
}

/// Create the per-app network unless it exists.
async fn ensure_network<R: Runtime>(host: &Host<R>, app: &AppName) -> Result<(), DeployError> {
    let name = naming::network_name(app);

    if host.runtime.network_exists(&name).await.unwrap_or(false) {
        return Ok(());
    }

    let mut labels = HashMap::new();
    labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
    labels.insert(LABEL_APP.to_string(), app.to_string());
    let config = NetworkConfig {
        name: name.clone(),
        driver: Some("bridge".to_string()),
        labels,
    };

    match host.runtime.create_network(&config).await {
        Ok(_) => {
            tracing::info!(network = %name, "created network");
            Ok(())
        }
        // Created between the check and the create.
        Err(NetworkError::AlreadyExists(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Stop and remove every application container of one release.
pub(super) async fn remove_release<R: Runtime>(
    host: &Host<R>,
    identity: &ReleaseIdentity,
) -> Result<(), DeployError> {
    let filters = ContainerFilters::for_app(identity.app(), true)
        .role(Role::Application)
        .revision(identity.revision());
    let ids: Vec<_> = host
        .runtime
        .list_containers(&filters)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    let result = cleanup::remove_containers(&host.runtime, &ids, host.stop_timeout).await;
    match result.failed.into_iter().next() {
        None => {
            tracing::info!(
                release = identity.project(),
                removed = result.removed.len(),
                "removed release containers"
            );
            Ok(())
        }
        Some(failure) => Err(ContainerError::Runtime(format!(
            "{}: {}",
            failure.container_id, failure.error
        ))
        .into()),
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), DeployError> {
    std::fs::copy(from, to)
        .map(|_| ())
        .map_err(|e| DeployError::filesystem(to, e))
}

fn write_file(path: &Path, content: &str) -> Result<(), DeployError> {
    std::fs::write(path, content).map_err(|e| DeployError::filesystem(path, e))
}

/// Base compose file (if any) followed by the generated override.
fn compose_files(definition: &AppDefinition, dir: &Path, override_file: &str) -> Vec<PathBuf> {
    definition
        .base_file(dir)
        .into_iter()
        .chain(std::iter::once(dir.join(override_file)))
        .collect()
}

// =============================================================================
// Initialized -> BranchValidated -> PortAllocated
// =============================================================================

impl Deployment<Initialized> {
    /// Accept the push if it updates the deploy branch and resolve its revision.
    ///
    /// Returns `Ok(None)` when the push is for another branch or deletes the
    /// branch; that is a skip, not a failure.
    pub async fn validate_branch<R>(
        self,
        host: &Host<R>,
        push: &PushRef,
    ) -> Result<Option<Deployment<BranchValidated>>, DeployError> {
        if !push.targets(&self.target) {
            tracing::info!(
                refname = %push.refname,
                branch = %self.target.branch,
                "push is not for the deploy branch, skipping"
            );
            return Ok(None);
        }
        if push.is_deletion() {
            tracing::info!(refname = %push.refname, "branch deleted, nothing to deploy");
            return Ok(None);
        }

        let revision = host.source.resolve(&self.target.app, &push.new).await?;
        tracing::info!(app = %self.target.app, revision = %revision, "deploying revision");
        Ok(Some(self.map_state(|_| BranchValidated { revision })))
    }
}

impl Deployment<BranchValidated> {
    #[must_use = "deployment state must be used"]
    pub fn allocate_port<R>(self, host: &Host<R>) -> Result<Deployment<PortAllocated>, DeployError> {
        let port = host.ports.allocate()?;
        tracing::info!(port, "allocated port");
        Ok(self.map_state(|s| PortAllocated {
            revision: s.revision,
            port,
        }))
    }
}

// =============================================================================
// PortAllocated -> CheckedOut -> EnvironmentLoaded -> Classified
// =============================================================================

impl Deployment<PortAllocated> {
    /// Materialize the revision into its release directory.
    ///
    /// A rollback reuses a surviving directory; otherwise the tree is checked
    /// out from the repository, in place if the directory already exists.
    #[must_use = "deployment state must be used"]
    pub async fn checkout<R>(self, host: &Host<R>) -> Result<Deployment<CheckedOut>, DeployError> {
        let app = &self.target.app;
        let dest = host.layout.release_dir(app, &self.state.revision);

        if self.method == ReleaseMethod::Rollback && dest.is_dir() {
            tracing::info!(dir = %dest.display(), "reusing existing checkout");
        } else {
            host.source
                .checkout(app, &self.state.revision, &dest)
                .await?;
            tracing::info!(dir = %dest.display(), "checked out release");
        }

        Ok(self.map_state(|s| CheckedOut {
            staging: Staging {
                revision: s.revision,
                port: s.port,
                checkout: dest,
            },
        }))
    }
}

impl Deployment<CheckedOut> {
    /// Copy the app's environment file in, then read mushak.yaml and the definition.
    pub fn load_environment<R>(
        self,
        host: &Host<R>,
        diag: &mut Diagnostics,
    ) -> Result<Deployment<EnvironmentLoaded>, DeployError> {
        let app = &self.target.app;
        let checkout = &self.state.staging.checkout;

        let env_prod = host.layout.env_prod_file(app);
        let env = host.layout.env_file(app);
        if env_prod.is_file() {
            copy_file(&env_prod, &checkout.join(".env.prod"))?;
            copy_file(&env_prod, &checkout.join(".env"))?;
            tracing::debug!(from = %env_prod.display(), "copied environment");
        } else if env.is_file() {
            copy_file(&env, &checkout.join(".env"))?;
            tracing::debug!(from = %env.display(), "copied environment");
        } else {
            diag.warn(Warning::environment(format!(
                "no .env.prod or .env in {}; deploying without environment file",
                host.layout.app_dir(app).display()
            )));
        }

        let config = AppConfig::discover(checkout)?;
        let definition = AppDefinition::detect(checkout)?;

        for service in &definition.services {
            if let Some(custom) = &service.container_name {
                diag.warn(Warning::definition(format!(
                    "container_name {:?} of service {} is replaced by the release name",
                    custom, service.name
                )));
            }
        }

        Ok(self.map_state(|s| EnvironmentLoaded {
            loaded: Loaded {
                staging: s.staging,
                config,
                definition,
            },
        }))
    }
}

impl Deployment<EnvironmentLoaded> {
    /// Partition services and mint the release's names.
    pub fn classify(self) -> Result<Deployment<Classified>, DeployError> {
        let loaded = &self.state.loaded;
        let classification = Classifier::new(&loaded.config.persistent_services)
            .classify(&loaded.definition, loaded.config.service_name.as_ref())?;
        let identity =
            ReleaseIdentity::mint(&self.target.app, &loaded.staging.revision, classification);

        Ok(self.map_state(|s| Classified {
            loaded: s.loaded,
            identity,
        }))
    }
}

// =============================================================================
// Classified -> Started
// =============================================================================

impl Deployment<Classified> {
    /// Build the application images and start them beside the serving release.
    #[must_use = "deployment state must be used"]
    pub async fn build_and_start<R: Runtime>(
        self,
        host: &Host<R>,
    ) -> Result<Deployment<Started>, DeployError> {
        let services: Vec<_> = self
            .state
            .identity
            .classification()
            .application()
            .iter()
            .cloned()
            .collect();
        self.start(host, services, StartMode::Build).await
    }

    /// Start the primary from its revision tag, plus external application services.
    #[must_use = "deployment state must be used"]
    pub async fn start_cached<R: Runtime>(
        self,
        host: &Host<R>,
    ) -> Result<Deployment<Started>, DeployError> {
        let identity = &self.state.identity;
        let definition = &self.state.loaded.definition;

        // Leftovers of an earlier run of the same revision would clash by name.
        remove_release(host, identity).await?;

        let services: Vec<_> = identity
            .classification()
            .application()
            .iter()
            .filter(|s| {
                *s == identity.primary()
                    || definition.service(s).is_some_and(|decl| decl.is_external())
            })
            .cloned()
            .collect();
        self.start(host, services, StartMode::Cached).await
    }

    async fn start<R: Runtime>(
        self,
        host: &Host<R>,
        services: Vec<ServiceName>,
        mode: StartMode,
    ) -> Result<Deployment<Started>, DeployError> {
        ensure_network(host, &self.target.app).await?;
        self.start_infrastructure(host).await?;

        let Loaded {
            staging,
            config,
            definition,
        } = &self.state.loaded;
        let identity = &self.state.identity;

        let rendered = compose::render_release(
            identity,
            definition,
            &services,
            staging.port,
            config.internal_port,
            mode,
        )
        .map_err(|e| DeployError::BuildFailure(format!("failed to render override: {}", e)))?;
        write_file(&staging.checkout.join(RELEASE_OVERRIDE_FILE), &rendered)?;

        let request = ComposeUp {
            project: identity.project().to_string(),
            workdir: staging.checkout.clone(),
            files: compose_files(definition, &staging.checkout, RELEASE_OVERRIDE_FILE),
            services,
            build: match mode {
                StartMode::Build => BuildPolicy::Always,
                StartMode::Cached => BuildPolicy::Never,
            },
            no_deps: true,
        };

        if let Err(e) = host.runtime.compose_up(&request).await {
            if let Err(cleanup) = remove_release(host, identity).await {
                tracing::warn!("cleanup after failed start also failed: {}", cleanup);
            }
            return Err(e.into());
        }

        tracing::info!(project = identity.project(), port = staging.port, "release started");
        Ok(self.map_state(|s| Started {
            loaded: s.loaded,
            identity: s.identity,
        }))
    }

    /// Bring up infrastructure services that are not running yet.
    ///
    /// They run from the `current` release when it has the compose file, so
    /// relative volume paths stay stable across releases; the very first
    /// deploy has no `current` and uses the new checkout.
    async fn start_infrastructure<R: Runtime>(&self, host: &Host<R>) -> Result<(), DeployError> {
        let app = &self.target.app;
        let infrastructure = self.state.identity.classification().infrastructure();
        if infrastructure.is_empty() {
            return Ok(());
        }

        let filters = ContainerFilters::for_app(app, false).role(Role::Infrastructure);
        let running: HashSet<String> = host
            .runtime
            .list_containers(&filters)
            .await?
            .iter()
            .filter_map(|c| c.label(LABEL_SERVICE).map(str::to_string))
            .collect();

        let missing: Vec<ServiceName> = infrastructure
            .iter()
            .filter(|s| !running.contains(s.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            tracing::debug!("infrastructure already running");
            return Ok(());
        }

        let definition = &self.state.loaded.definition;
        let current = host.layout.current_link(app);
        let root = match definition.base_file(&current) {
            Some(base) if base.is_file() => current,
            _ => self.state.loaded.staging.checkout.clone(),
        };

        let rendered = compose::render_infrastructure(app, &missing).map_err(|e| {
            DeployError::BuildFailure(format!("failed to render infrastructure override: {}", e))
        })?;
        write_file(&root.join(INFRA_OVERRIDE_FILE), &rendered)?;

        let request = ComposeUp {
            project: naming::infra_project(app),
            workdir: root.clone(),
            files: compose_files(definition, &root, INFRA_OVERRIDE_FILE),
            services: missing,
            build: BuildPolicy::IfMissing,
            no_deps: true,
        };
        host.runtime.compose_up(&request).await?;
        tracing::info!(root = %root.display(), "infrastructure started");
        Ok(())
    }
}

// =============================================================================
// Started -> HealthChecked
// =============================================================================

impl Deployment<Started> {
    /// Poll the new primary until healthy.
    ///
    /// On failure or interruption the deployment is handed back so the caller
    /// can remove the new containers.
    #[must_use = "deployment state must be used"]
    pub async fn health_check<R>(
        self,
        host: &Host<R>,
        shutdown: &Shutdown,
    ) -> TransitionResult<HealthChecked, Started> {
        let port = self.state.loaded.staging.port;
        let policy = HealthPolicy {
            path: self.state.loaded.config.health_path.clone(),
            attempts: self.state.loaded.config.health_timeout,
            interval: host.health_interval,
        };

        match wait_healthy(host.probe.as_ref(), port, &policy, shutdown).await {
            HealthOutcome::Healthy { attempts } => {
                tracing::info!(attempts, "release is healthy");
                Ok(self.map_state(|s| HealthChecked {
                    loaded: s.loaded,
                    identity: s.identity,
                    attempts,
                }))
            }
            HealthOutcome::Unhealthy { attempts } => {
                Err((self, DeployError::HealthCheckFailed { attempts }))
            }
            HealthOutcome::Interrupted { attempts } => {
                Err((self, DeployError::Interrupted { attempts }))
            }
        }
    }

    /// Remove this release's application containers. Nothing else is touched.
    pub async fn rollback<R: Runtime>(self, host: &Host<R>) -> Result<(), DeployError> {
        remove_release(host, &self.state.identity).await
    }
}

// =============================================================================
// HealthChecked -> CutOver
// =============================================================================

impl Deployment<HealthChecked> {
    /// Point the proxy and `current` at the new release.
    ///
    /// A failed proxy reload leaves the previous route in place and hands the
    /// deployment back for rollback.
    #[must_use = "deployment state must be used"]
    pub async fn cutover<R>(
        self,
        host: &Host<R>,
        diag: &mut Diagnostics,
    ) -> TransitionResult<CutOver, HealthChecked> {
        let app = self.target.app.clone();
        let revision = self.state.loaded.staging.revision.clone();
        let previous = checkouts::current_revision(&host.layout, &app);

        let routed = host
            .proxy
            .set_route(&app, &self.target.domain, self.state.loaded.staging.port)
            .await;
        if let Err(e) = routed {
            return Err((self, e.into()));
        }

        if let Err(e) = checkouts::switch_current(&host.layout, &app, &revision) {
            diag.warn(Warning::active_release(format!(
                "failed to point current at {}: {}",
                revision, e
            )));
        }

        Ok(self.map_state(|s| CutOver {
            loaded: s.loaded,
            identity: s.identity,
            attempts: s.attempts,
            previous,
        }))
    }

    pub async fn rollback<R: Runtime>(self, host: &Host<R>) -> Result<(), DeployError> {
        remove_release(host, &self.state.identity).await
    }
}

// =============================================================================
// CutOver -> Completed
// =============================================================================

impl Deployment<CutOver> {
    /// Retire old releases, tag the image, record the release, collect garbage.
    ///
    /// Only the manifest append is fatal; every other step becomes a warning.
    pub async fn finalize<R: Runtime>(
        self,
        host: &Host<R>,
        diag: &mut Diagnostics,
    ) -> Result<Deployment<Completed>, DeployError> {
        let app = &self.target.app;
        let CutOver {
            loaded,
            identity,
            attempts,
            previous,
        } = &self.state;
        let revision = &loaded.staging.revision;

        match cleanup::detect_stale_releases(&host.runtime, app, revision).await {
            Ok(stale) if !stale.is_empty() => {
                let ids: Vec<_> = stale.into_iter().map(|c| c.id).collect();
                let result =
                    cleanup::remove_containers(&host.runtime, &ids, host.stop_timeout).await;
                tracing::info!(removed = result.removed.len(), "retired old release containers");
                for failure in &result.failed {
                    diag.warn(Warning::container_cleanup(format!(
                        "failed to remove old container {}: {}",
                        failure.container_id, failure.error
                    )));
                }
            }
            Ok(_) => {}
            Err(e) => diag.warn(Warning::container_cleanup(format!(
                "failed to list old containers: {}",
                e
            ))),
        }

        match checkouts::prune_releases(&host.layout, app, KEEP_CHECKOUTS, &[revision]) {
            Ok(removed) if !removed.is_empty() => {
                tracing::info!(count = removed.len(), "pruned old checkouts");
            }
            Ok(_) => {}
            Err(e) => diag.warn(Warning::checkout_prune(format!(
                "failed to prune checkouts of {}: {}",
                app, e
            ))),
        }

        let external_primary = match self.method {
            ReleaseMethod::Build => loaded
                .definition
                .service(identity.primary())
                .filter(|decl| !decl.builds)
                .and_then(|decl| decl.image.as_deref())
                .and_then(|image| ImageRef::parse(image).ok()),
            _ => None,
        };
        if let Err(e) =
            images::tag_release(&host.runtime, app, revision, external_primary.as_ref()).await
        {
            diag.warn(Warning::image_tag(format!(
                "failed to tag {}: {}",
                identity.image(),
                e
            )));
        }

        let manifest = Manifest::at(host.layout.manifest_path(app));
        manifest.append(&Release::new(
            revision.clone(),
            loaded.staging.port,
            self.method.clone(),
            Utc::now(),
        ))?;

        if self.method == ReleaseMethod::Build {
            let history: Vec<_> = manifest
                .history()
                .map(|entries| entries.into_iter().map(|r| r.revision).collect())
                .unwrap_or_default();
            let policy = GcPolicy {
                keep_images: loaded.config.keep_images,
                cache_limit: loaded.config.cache_limit,
            };
            images::collect_garbage(&host.runtime, app, revision, &history, policy, diag).await;
        }

        let summary = DeploySummary {
            app: app.clone(),
            revision: revision.clone(),
            port: loaded.staging.port,
            method: self.method.clone(),
            previous: previous.clone(),
            health_attempts: *attempts,
        };
        Ok(self.map_state(|_| Completed { summary }))
    }
}

// =============================================================================
// Completed
// =============================================================================

impl Deployment<Completed> {
    pub fn summary(&self) -> &DeploySummary {
        &self.state.summary
    }

    /// Finish the deployment and return its summary.
    pub fn finish(self) -> DeploySummary {
        self.state.summary
    }
}
