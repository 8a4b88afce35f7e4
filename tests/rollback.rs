// ABOUTME: Tests for listing restorable versions and rolling back to them.
// ABOUTME: Rollbacks start from the revision's tagged image and never rebuild.

mod support;

use mushak::deploy::{
    DeployErrorKind, DeployOutcome, DeploySummary, Silent, Stage, deploy, list_versions, rollback,
};
use mushak::diagnostics::Diagnostics;
use mushak::registry::ReleaseMethod;
use mushak::runtime::BuildPolicy;
use mushak::shutdown::Shutdown;
use support::{Fixture, Recorder};

const REV_A: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678";
const REV_B: &str = "e4f5a6b7c8d90718293a4b5c6d7e8f9012345678";

/// Deploy A then B; B is serving.
async fn two_releases() -> Fixture {
    let f = Fixture::new();
    f.commit(REV_A);
    f.commit(REV_B);
    for rev in [REV_A, REV_B] {
        let mut diag = Diagnostics::default();
        let outcome = deploy(
            &f.host,
            &f.target,
            &f.push(rev),
            &Shutdown::never(),
            &Silent,
            &mut diag,
        )
        .await
        .expect("deploy should succeed");
        assert!(matches!(outcome, DeployOutcome::Deployed(_)));
    }
    f
}

async fn roll_back(f: &Fixture, revision: &str) -> mushak::error::Result<DeploySummary> {
    let mut diag = Diagnostics::default();
    rollback(
        &f.host,
        &f.target,
        revision,
        &Shutdown::never(),
        &Silent,
        &mut diag,
    )
    .await
}

// =============================================================================
// Version listing
// =============================================================================

#[tokio::test]
async fn versions_are_newest_first_with_current_marked() {
    let f = two_releases().await;

    let versions = list_versions(&f.host, f.app()).await.unwrap();

    let listed: Vec<_> = versions
        .iter()
        .map(|v| (v.revision.as_str(), v.is_current))
        .collect();
    assert_eq!(listed, vec![("e4f5a6b", true), ("a1b2c3d", false)]);
    assert!(versions.iter().all(|v| v.has_image && v.has_checkout));
    assert_eq!(versions[0].port, Some(8001));
    assert_eq!(versions[0].method, ReleaseMethod::Build);
}

#[tokio::test]
async fn versions_without_image_are_not_listed() {
    let f = two_releases().await;
    f.host
        .runtime
        .state()
        .images
        .iter_mut()
        .for_each(|image| image.tags.retain(|t| t.to_string() != "mushak-shop:a1b2c3d"));

    let versions = list_versions(&f.host, f.app()).await.unwrap();

    let revisions: Vec<_> = versions.iter().map(|v| v.revision.as_str()).collect();
    assert_eq!(revisions, vec!["e4f5a6b"]);
}

#[tokio::test]
async fn no_versions_before_first_deploy() {
    let f = Fixture::new();
    assert!(list_versions(&f.host, f.app()).await.unwrap().is_empty());
}

// =============================================================================
// Rollback
// =============================================================================

#[tokio::test]
async fn rollback_serves_previous_revision_from_its_image() {
    let f = two_releases().await;
    let recorder = Recorder::default();
    let mut diag = Diagnostics::default();

    let summary = rollback(
        &f.host,
        &f.target,
        "a1b2c3d",
        &Shutdown::never(),
        &recorder,
        &mut diag,
    )
    .await
    .unwrap();

    assert_eq!(summary.revision.as_str(), "a1b2c3d");
    assert_eq!(summary.method, ReleaseMethod::Rollback);
    assert_eq!(summary.previous.as_ref().map(|r| r.as_str()), Some("e4f5a6b"));
    assert_eq!(summary.port, 8002);

    assert_eq!(
        recorder.stages(),
        vec![
            Stage::AllocatePort,
            Stage::Checkout,
            Stage::LoadEnvironment,
            Stage::ClassifyServices,
            Stage::StartCached,
            Stage::HealthCheck,
            Stage::CutOver,
            Stage::Finalize,
        ]
    );

    assert_eq!(f.current().as_deref(), Some("a1b2c3d"));
    assert!(f.route().unwrap().contains("localhost:8002"));
    assert!(f.running_for("e4f5a6b").is_empty());
    assert!(
        f.running_for("a1b2c3d")
            .contains("mushak-shop-a1b2c3d-web")
    );

    let last_up = f.host.runtime.state().compose_calls.last().cloned().unwrap();
    assert_eq!(last_up.build, BuildPolicy::Never);
    assert_eq!(last_up.project, "mushak-shop-a1b2c3d");

    let manifest = f.manifest();
    let lines: Vec<_> = manifest.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[2].starts_with("a1b2c3d "));
    assert!(lines[2].ends_with(" 8002 rollback"));

    let versions = list_versions(&f.host, f.app()).await.unwrap();
    assert_eq!(versions[0].revision.as_str(), "a1b2c3d");
    assert!(versions[0].is_current);
    assert_eq!(versions[0].method, ReleaseMethod::Rollback);
}

#[tokio::test]
async fn rollback_accepts_full_commit_hash() {
    let f = two_releases().await;

    let summary = roll_back(&f, REV_A).await.unwrap();

    assert_eq!(summary.revision.as_str(), "a1b2c3d");
    assert_eq!(f.current().as_deref(), Some("a1b2c3d"));
    assert!(f.manifest().lines().last().unwrap().ends_with(" rollback"));
}

#[tokio::test]
async fn rollback_to_serving_revision_is_rejected() {
    let f = two_releases().await;

    let err = roll_back(&f, "e4f5a6b").await.unwrap_err();

    assert_eq!(
        err.deploy_error().map(|e| e.kind()),
        Some(DeployErrorKind::InvalidTarget)
    );
    assert_eq!(err.stage(), None);
    assert_eq!(f.manifest().lines().count(), 2);
}

#[tokio::test]
async fn rollback_to_unknown_revision_is_rejected() {
    let f = two_releases().await;

    for revision in ["deadbee", "../../etc", ""] {
        let err = roll_back(&f, revision).await.unwrap_err();
        assert_eq!(
            err.deploy_error().map(|e| e.kind()),
            Some(DeployErrorKind::InvalidTarget),
            "revision {revision:?}"
        );
    }
    assert_eq!(f.current().as_deref(), Some("e4f5a6b"));
}

#[tokio::test]
async fn unhealthy_rollback_leaves_serving_release_alone() {
    let f = two_releases().await;
    let route_before = f.route();
    f.probe.set_healthy(false);

    let err = roll_back(&f, "a1b2c3d").await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::HealthCheck));
    assert_eq!(f.route(), route_before);
    assert_eq!(f.current().as_deref(), Some("e4f5a6b"));
    assert_eq!(f.manifest().lines().count(), 2);
    assert!(f.running_for("a1b2c3d").is_empty());
    assert_eq!(f.running_for("e4f5a6b").len(), 2);
}

#[tokio::test]
async fn rollback_restores_pruned_checkout() {
    let f = two_releases().await;
    let checkout = f.host.layout.app_dir(f.app()).join("a1b2c3d");
    std::fs::remove_dir_all(&checkout).unwrap();

    let versions = list_versions(&f.host, f.app()).await.unwrap();
    assert!(!versions[1].has_checkout);

    let recorder = Recorder::default();
    let mut diag = Diagnostics::default();
    rollback(
        &f.host,
        &f.target,
        "a1b2c3d",
        &Shutdown::never(),
        &recorder,
        &mut diag,
    )
    .await
    .unwrap();

    assert!(checkout.join("docker-compose.yml").is_file());
    assert!(recorder.notes().iter().any(|n| n.contains("pruned")));
}
