// ABOUTME: Integration tests for deploy lock functionality.
// ABOUTME: Tests lock acquisition, stale detection, and force breaking.

use chrono::Utc;
use mushak::deploy::{DeployError, DeployErrorKind, DeployLock, LockInfo};
use mushak::layout::Layout;
use mushak::types::AppName;

fn setup() -> (tempfile::TempDir, Layout, AppName) {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::rooted_at(dir.path());
    (dir, layout, AppName::new("shop").unwrap())
}

fn write_lock(layout: &Layout, app: &AppName, info: &LockInfo) {
    let path = layout.lock_path(app);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string(info).unwrap()).unwrap();
}

/// Test: Lock acquired prevents a second deployment of the same app.
#[test]
fn lock_acquired_prevents_second_deployment() {
    let (_dir, layout, app) = setup();

    let lock = DeployLock::acquire(&layout, &app, false).expect("first lock should succeed");
    assert!(lock.path().exists());

    let err = DeployLock::acquire(&layout, &app, false).expect_err("second lock should fail");
    assert_eq!(err.kind(), DeployErrorKind::Locked);
    match err {
        DeployError::LockHeld { holder, pid, .. } => {
            assert!(!holder.is_empty(), "holder should be set");
            assert_eq!(pid, std::process::id());
        }
        other => panic!("expected LockHeld, got {other:?}"),
    }

    lock.release().expect("release should succeed");

    let again = DeployLock::acquire(&layout, &app, false).expect("lock should succeed after release");
    again.release().unwrap();
}

/// Test: Locks of different apps are independent.
#[test]
fn locks_are_per_app() {
    let (_dir, layout, app) = setup();
    let other = AppName::new("blog").unwrap();

    let shop = DeployLock::acquire(&layout, &app, false).unwrap();
    let blog = DeployLock::acquire(&layout, &other, false).expect("other app should not be blocked");

    shop.release().unwrap();
    blog.release().unwrap();
}

/// Test: Force breaks a fresh lock.
#[test]
fn force_breaks_held_lock() {
    let (_dir, layout, app) = setup();
    write_lock(&layout, &app, &LockInfo::new(&app));

    assert!(DeployLock::acquire(&layout, &app, false).is_err());
    let lock = DeployLock::acquire(&layout, &app, true).expect("force should break the lock");
    lock.release().unwrap();
}

/// Test: A lock older than an hour is broken automatically.
#[test]
fn stale_lock_is_broken() {
    let (_dir, layout, app) = setup();
    let mut info = LockInfo::new(&app);
    info.holder = "old-host".to_string();
    info.started_at = Utc::now() - chrono::Duration::hours(2);
    write_lock(&layout, &app, &info);

    let lock = DeployLock::acquire(&layout, &app, false).expect("stale lock should be broken");

    let content = std::fs::read_to_string(lock.path()).unwrap();
    let current: LockInfo = serde_json::from_str(&content).unwrap();
    assert_ne!(current.holder, "old-host");
    lock.release().unwrap();
}

/// Test: An unreadable lock file is broken.
#[test]
fn corrupted_lock_is_broken() {
    let (_dir, layout, app) = setup();
    let path = layout.lock_path(&app);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "not json").unwrap();

    let lock = DeployLock::acquire(&layout, &app, false).expect("corrupted lock should be broken");
    lock.release().unwrap();
}

/// Test: Dropping a lock without releasing it removes the file.
#[test]
fn dropped_lock_is_removed() {
    let (_dir, layout, app) = setup();
    let path = {
        let lock = DeployLock::acquire(&layout, &app, false).unwrap();
        lock.path().to_path_buf()
    };
    assert!(!path.exists());
    DeployLock::acquire(&layout, &app, false).unwrap().release().unwrap();
}
