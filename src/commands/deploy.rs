// ABOUTME: Deploy and receive command implementations.
// ABOUTME: Reads post-receive lines or explicit arguments and runs the pipeline under the app lock.

use mushak::config::{DeployTarget, PushRef};
use mushak::deploy::{self, DeployLock, DeployOutcome, Host};
use mushak::diagnostics::Diagnostics;
use mushak::error::Result;
use mushak::layout::Layout;
use mushak::output::Output;
use mushak::runtime::BollardRuntime;
use mushak::shutdown::{Shutdown, listen_for_signals};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{release_lock, report_warnings};

/// Deploy from post-receive lines on stdin.
///
/// Pushes to other refs are ignored without touching the container engine.
pub async fn receive(
    target: DeployTarget,
    layout: Layout,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pushes = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let push = PushRef::parse_line(&line)?;
        if push.targets(&target) && !push.is_deletion() {
            pushes.push(push);
        } else {
            output.progress(&format!("Ignoring push to {}", push.refname));
        }
    }

    if pushes.is_empty() {
        output.success(&format!(
            "Nothing to deploy: no push to branch {}",
            target.branch
        ));
        return Ok(());
    }

    let host = Host::local(layout).await?;
    let shutdown = listen_for_signals();
    for push in &pushes {
        deploy_push(&host, &target, push, force, &shutdown, &output).await?;
    }
    Ok(())
}

/// Deploy one explicit `<old> <new> <ref>` triple.
pub async fn deploy(
    target: DeployTarget,
    push: PushRef,
    layout: Layout,
    force: bool,
    mut output: Output,
) -> Result<()> {
    output.start_timer();

    let host = Host::local(layout).await?;
    let shutdown = listen_for_signals();
    deploy_push(&host, &target, &push, force, &shutdown, &output).await
}

async fn deploy_push(
    host: &Host<BollardRuntime>,
    target: &DeployTarget,
    push: &PushRef,
    force: bool,
    shutdown: &Shutdown,
    output: &Output,
) -> Result<()> {
    output.progress(&format!(
        "Deploying {} ({} → {})",
        target.app, push.refname, target.domain
    ));

    let mut diag = Diagnostics::default();
    let lock = DeployLock::acquire(&host.layout, &target.app, force)?;
    let result = deploy::deploy(host, target, push, shutdown, output, &mut diag).await;
    release_lock(lock, &mut diag);
    report_warnings(output, &diag);

    match result? {
        DeployOutcome::Skipped { refname } => {
            output.success(&format!("Nothing to deploy for {refname}"));
        }
        DeployOutcome::Deployed(summary) => {
            output.success(&format!(
                "Deployed {} at {} on port {}",
                summary.app, summary.revision, summary.port
            ));
        }
    }
    Ok(())
}
