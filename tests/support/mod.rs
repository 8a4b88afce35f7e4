// ABOUTME: Test support utilities.
// ABOUTME: In-memory container engine, git, probe and proxy fakes wired into a temp-dir Host.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;

use mushak::config::{DeployTarget, PushRef};
use mushak::deploy::{Host, Reporter, Stage};
use mushak::layout::Layout;
use mushak::ports::{PortAllocator, PortProbe};
use mushak::proxy::{ProxyError, ProxyManager, ProxyReload};
use mushak::runtime::{
    BuildPolicy, ComposeError, ComposeOps, ComposeUp, ContainerError, ContainerFilters,
    ContainerOps, ContainerSummary, ImageError, ImageOps, ImageSummary, NetworkConfig,
    NetworkError, NetworkOps,
};
use mushak::health::HealthProbe;
use mushak::source::{SourceControl, SourceError};
use mushak::types::{AppName, ContainerId, ImageRef, NetworkId, Revision};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("mushak=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// =============================================================================
// Container engine
// =============================================================================

/// Everything the fake engine holds. Tests inspect and seed it directly.
#[derive(Debug, Default)]
pub struct EngineState {
    pub containers: Vec<ContainerSummary>,
    pub images: Vec<ImageSummary>,
    pub networks: Vec<String>,
    pub compose_calls: Vec<ComposeUp>,
    pub removed_images: Vec<String>,
    /// Makes every `compose up` fail as a broken build would.
    pub fail_compose: bool,
    /// Makes every `compose up` hang as a long build would.
    pub hang_compose: bool,
    /// Makes every image removal fail.
    pub fail_image_removal: bool,
    next_id: u64,
    clock: i64,
}

impl EngineState {
    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("c{:04}", self.next_id)
    }

    /// Monotonic creation times so "newest" is well defined.
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        DateTime::<Utc>::UNIX_EPOCH + ChronoDuration::seconds(1_700_000_000 + self.clock)
    }

    fn find_image(&self, reference: &ImageRef) -> Option<usize> {
        self.images
            .iter()
            .position(|image| image.tags.iter().any(|t| t == reference))
    }

    fn ensure_image(&mut self, reference: ImageRef) {
        if self.find_image(&reference).is_none() {
            let created = self.tick();
            let id = format!("sha256:{}", self.images.len() + 1);
            self.images.push(ImageSummary {
                id,
                tags: vec![reference],
                created,
            });
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn state(&self) -> parking_lot::MutexGuard<'_, EngineState> {
        self.state.lock()
    }

    pub fn add_image(&self, reference: &str) {
        let reference = ImageRef::parse(reference).expect("valid image reference");
        self.state.lock().ensure_image(reference);
    }

    pub fn add_container(&self, name: &str, labels: &[(&str, &str)], running: bool) {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.containers.push(ContainerSummary {
            id: ContainerId::new(id),
            name: name.to_string(),
            image: String::new(),
            state: if running { "running" } else { "exited" }.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .state
            .lock()
            .containers
            .iter()
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn image_tags(&self) -> Vec<String> {
        let mut tags: Vec<_> = self
            .state
            .lock()
            .images
            .iter()
            .flat_map(|image| image.tags.iter().map(|t| t.to_string()))
            .collect();
        tags.sort();
        tags
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.image_tags().iter().any(|t| t == reference)
    }
}

fn compose_failure(stderr: impl Into<String>) -> ComposeError {
    ComposeError::Failed {
        command: "compose up".to_string(),
        status: "exit status: 1".to_string(),
        stderr: stderr.into(),
    }
}

#[async_trait]
impl ContainerOps for FakeEngine {
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        Ok(self
            .state
            .lock()
            .containers
            .iter()
            .filter(|c| filters.all || c.is_running())
            .filter(|c| filters.matches_labels(&c.labels))
            .filter(|c| filters.name.as_ref().is_none_or(|n| c.name.contains(n)))
            .cloned()
            .collect())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let container = state
            .containers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        if !container.is_running() {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        container.state = "exited".to_string();
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let mut state = self.state.lock();
        let before = state.containers.len();
        state.containers.retain(|c| &c.id != id);
        if state.containers.len() == before {
            return Err(ContainerError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageOps for FakeEngine {
    async fn list_images(&self, pattern: &str) -> Result<Vec<ImageSummary>, ImageError> {
        let matches = |name: &str| match pattern.strip_suffix('*') {
            Some(prefix) => name.starts_with(prefix),
            None => name == pattern,
        };
        Ok(self
            .state
            .lock()
            .images
            .iter()
            .filter(|image| image.tags.iter().any(|t| matches(t.name())))
            .cloned()
            .collect())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self.state.lock().find_image(reference).is_some())
    }

    async fn tag_image(&self, source: &ImageRef, target: &ImageRef) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        let index = state
            .find_image(source)
            .ok_or_else(|| ImageError::NotFound(source.to_string()))?;

        // A tag moves: drop it from whichever image carried it before.
        for image in state.images.iter_mut() {
            image.tags.retain(|t| t != target);
        }
        state.images[index].tags.push(target.clone());
        Ok(())
    }

    async fn remove_image(&self, reference: &ImageRef, _force: bool) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        if state.fail_image_removal {
            return Err(ImageError::InUse(reference.to_string()));
        }
        let index = state
            .find_image(reference)
            .ok_or_else(|| ImageError::NotFound(reference.to_string()))?;
        state.images[index].tags.retain(|t| t != reference);
        state.images.retain(|image| !image.tags.is_empty());
        state.removed_images.push(reference.to_string());
        Ok(())
    }

    async fn prune_dangling(&self, _older_than: Duration) -> Result<(), ImageError> {
        Ok(())
    }
}

#[async_trait]
impl NetworkOps for FakeEngine {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        let mut state = self.state.lock();
        if state.networks.contains(&config.name) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        state.networks.push(config.name.clone());
        Ok(NetworkId::new(format!("net-{}", config.name)))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        Ok(self.state.lock().networks.iter().any(|n| n == name))
    }
}

#[async_trait]
impl ComposeOps for FakeEngine {
    /// Starts one container per requested service, as described by the
    /// generated override (the last file of the request).
    async fn compose_up(&self, request: &ComposeUp) -> Result<(), ComposeError> {
        let (fail, hang) = {
            let mut state = self.state.lock();
            state.compose_calls.push(request.clone());
            (state.fail_compose, state.hang_compose)
        };
        if fail {
            return Err(compose_failure("failed to solve: process did not complete"));
        }
        if hang {
            std::future::pending::<()>().await;
        }

        let override_file = request
            .files
            .last()
            .ok_or_else(|| compose_failure("no compose file"))?;
        let yaml = std::fs::read_to_string(override_file)?;
        let doc: serde_yaml::Value =
            serde_yaml::from_str(&yaml).map_err(|e| compose_failure(e.to_string()))?;

        let mut state = self.state.lock();
        for service in &request.services {
            let entry = &doc["services"][service.as_str()];
            let name = entry["container_name"]
                .as_str()
                .ok_or_else(|| compose_failure(format!("no such service: {}", service)))?
                .to_string();

            let image = match entry["image"].as_str() {
                Some(image) => {
                    let reference =
                        ImageRef::parse(image).map_err(|e| compose_failure(e.to_string()))?;
                    if request.build == BuildPolicy::Never && state.find_image(&reference).is_none()
                    {
                        return Err(compose_failure(format!("no such image: {}", image)));
                    }
                    state.ensure_image(reference);
                    image.to_string()
                }
                None => {
                    if request.build == BuildPolicy::Always {
                        let built = format!("{}-{}", request.project, service);
                        state.ensure_image(ImageRef::local(built.clone(), "latest"));
                        built
                    } else {
                        String::new()
                    }
                }
            };

            let labels: HashMap<String, String> = entry["labels"]
                .as_mapping()
                .map(|labels| {
                    labels
                        .iter()
                        .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            state.containers.retain(|c| c.name != name);
            let id = state.next_id();
            state.containers.push(ContainerSummary {
                id: ContainerId::new(id),
                name,
                image,
                state: "running".to_string(),
                labels,
            });
        }
        Ok(())
    }

    async fn prune_build_cache(&self, _older_than: Duration) -> Result<(), ComposeError> {
        Ok(())
    }
}

// =============================================================================
// Host collaborators
// =============================================================================

/// Hands out 8000, 8001, ... as if each allocated port got bound right away.
#[derive(Debug)]
pub struct SequentialPorts(AtomicU16);

impl Default for SequentialPorts {
    fn default() -> Self {
        Self(AtomicU16::new(8000))
    }
}

impl PortProbe for SequentialPorts {
    fn is_free(&self, port: u16) -> bool {
        self.0
            .compare_exchange(port, port + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Answers healthy once `healthy_after` probes have been made; 0 means never.
#[derive(Debug, Clone, Default)]
pub struct FakeProbe {
    healthy_after: Arc<AtomicU32>,
    calls: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl FakeProbe {
    pub fn healthy() -> Self {
        let probe = Self::default();
        probe.healthy_after.store(1, Ordering::SeqCst);
        probe
    }

    pub fn never_healthy() -> Self {
        Self::default()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy_after
            .store(if healthy { 1 } else { 0 }, Ordering::SeqCst);
        self.calls.store(0, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn check(&self, _port: u16, _path: &str) -> bool {
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let after = self.healthy_after.load(Ordering::SeqCst);
        after != 0 && calls >= after
    }
}

/// Counts reloads and optionally fails them.
#[derive(Debug, Clone, Default)]
pub struct FakeReload {
    reloads: Arc<AtomicU32>,
    failing: Arc<Mutex<bool>>,
}

#[allow(dead_code)]
impl FakeReload {
    pub fn reloads(&self) -> u32 {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}

#[async_trait]
impl ProxyReload for FakeReload {
    async fn reload(&self) -> Result<(), ProxyError> {
        if *self.failing.lock() {
            return Err(ProxyError::Reload {
                primary: "systemctl exited with 1".to_string(),
                fallback: "caddy exited with 1".to_string(),
            });
        }
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Repository of revision trees held in memory.
#[derive(Debug, Clone, Default)]
pub struct FakeRepo {
    trees: Arc<Mutex<BTreeMap<String, Vec<(String, String)>>>>,
}

#[allow(dead_code)]
impl FakeRepo {
    /// Register a commit whose tree holds `files` (`(path, content)`).
    pub fn commit(&self, revision: &str, files: &[(&str, &str)]) {
        self.trees.lock().insert(
            revision.to_string(),
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        );
    }
}

#[async_trait]
impl SourceControl for FakeRepo {
    async fn resolve(&self, _app: &AppName, rev: &str) -> Result<Revision, SourceError> {
        let trees = self.trees.lock();
        let full = trees
            .keys()
            .find(|known| known.starts_with(rev) || rev.starts_with(known.as_str()))
            .ok_or_else(|| SourceError::UnknownRevision(rev.to_string()))?;
        Ok(Revision::abbreviate(full)?)
    }

    async fn checkout(
        &self,
        _app: &AppName,
        rev: &Revision,
        dest: &Path,
    ) -> Result<(), SourceError> {
        let files = self
            .trees
            .lock()
            .iter()
            .find(|(known, _)| known.starts_with(rev.as_str()))
            .map(|(_, files)| files.clone())
            .ok_or_else(|| SourceError::UnknownRevision(rev.to_string()))?;

        std::fs::create_dir_all(dest)?;
        for (path, content) in files {
            std::fs::write(dest.join(path), content)?;
        }
        Ok(())
    }
}

// =============================================================================
// Reporter
// =============================================================================

/// Records stages in the order they ran.
#[derive(Debug, Default)]
pub struct Recorder {
    stages: Mutex<Vec<Stage>>,
    notes: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn stages(&self) -> Vec<Stage> {
        self.stages.lock().clone()
    }

    pub fn notes(&self) -> Vec<String> {
        self.notes.lock().clone()
    }
}

impl Reporter for Recorder {
    fn stage(&self, stage: Stage) {
        self.stages.lock().push(stage);
    }

    fn note(&self, message: &str) {
        self.notes.lock().push(message.to_string());
    }
}

// =============================================================================
// Fixture
// =============================================================================

pub const COMPOSE: &str = r#"services:
  web:
    build: .
  worker:
    build: .
  db:
    image: postgres:15
"#;

/// A temp-dir host around the fakes, plus handles to inspect them.
#[allow(dead_code)]
pub struct Fixture {
    pub dir: TempDir,
    pub host: Host<FakeEngine>,
    pub probe: FakeProbe,
    pub reload: FakeReload,
    pub repo: FakeRepo,
    pub target: DeployTarget,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Self {
        init_tracing();
        let dir = tempfile::tempdir().expect("temp dir");
        let layout = Layout::rooted_at(dir.path());
        let probe = FakeProbe::healthy();
        let reload = FakeReload::default();
        let repo = FakeRepo::default();

        let host = Host {
            runtime: FakeEngine::default(),
            ports: PortAllocator::new(Box::<SequentialPorts>::default()),
            probe: Box::new(probe.clone()),
            proxy: ProxyManager::new(&layout, Box::new(reload.clone())),
            source: Box::new(repo.clone()),
            health_interval: Duration::from_millis(1),
            stop_timeout: Duration::from_secs(1),
            layout,
        };

        Self {
            dir,
            host,
            probe,
            reload,
            repo,
            target: DeployTarget::new("shop", "shop.example.com", "main").expect("valid target"),
        }
    }

    pub fn app(&self) -> &AppName {
        &self.target.app
    }

    /// Commit a tree with the standard three-service compose file.
    pub fn commit(&self, revision: &str) {
        self.repo.commit(
            revision,
            &[
                ("docker-compose.yml", COMPOSE),
                ("mushak.yaml", "internal_port: 3000\nhealth_timeout: 3\n"),
            ],
        );
    }

    pub fn push(&self, revision: &str) -> PushRef {
        PushRef::new("0000000000000000000000000000000000000000", revision, "refs/heads/main")
    }

    pub fn manifest(&self) -> String {
        std::fs::read_to_string(self.host.layout.manifest_path(self.app())).unwrap_or_default()
    }

    pub fn route(&self) -> Option<String> {
        self.host.proxy.read_route(self.app())
    }

    pub fn current(&self) -> Option<String> {
        std::fs::read_link(self.host.layout.current_link(self.app()))
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    }

    /// Names of running containers whose revision label matches.
    pub fn running_for(&self, revision: &str) -> HashSet<String> {
        self.host
            .runtime
            .state()
            .containers
            .iter()
            .filter(|c| c.is_running())
            .filter(|c| c.label("mushak.revision") == Some(revision))
            .map(|c| c.name.clone())
            .collect()
    }
}
