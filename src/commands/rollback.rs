// ABOUTME: Rollback command implementation.
// ABOUTME: Restores a previously deployed revision from its tagged image under the app lock.

use mushak::config::DeployTarget;
use mushak::deploy::{self, DeployLock, Host};
use mushak::diagnostics::Diagnostics;
use mushak::error::Result;
use mushak::layout::Layout;
use mushak::output::Output;
use mushak::shutdown::listen_for_signals;

use super::{release_lock, report_warnings};

pub async fn rollback(
    target: DeployTarget,
    revision: &str,
    layout: Layout,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();
    output.progress(&format!("Rolling back {} to {}", target.app, revision));

    let host = Host::local(layout).await?;
    let shutdown = listen_for_signals();
    let mut diag = Diagnostics::default();

    let lock = DeployLock::acquire(&host.layout, &target.app, force)?;
    let result = deploy::rollback(&host, &target, revision, &shutdown, &output, &mut diag).await;
    release_lock(lock, &mut diag);
    report_warnings(&output, &diag);

    let summary = result?;
    match &summary.previous {
        Some(previous) => output.success(&format!(
            "Rolled back {} from {} to {} on port {}",
            summary.app, previous, summary.revision, summary.port
        )),
        None => output.success(&format!(
            "Rolled back {} to {} on port {}",
            summary.app, summary.revision, summary.port
        )),
    }
    Ok(())
}
