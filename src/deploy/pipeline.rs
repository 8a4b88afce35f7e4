// ABOUTME: Runs the deployment state machine end to end for one push.
// ABOUTME: Reports each stage and attributes failures to the stage they happened in.

use crate::config::{DeployTarget, PushRef};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::registry::ReleaseMethod;
use crate::runtime::Runtime;
use crate::shutdown::Shutdown;
use crate::types::{AppName, Revision};

use std::future::Future;

use super::Deployment;
use super::error::DeployError;
use super::host::Host;
use super::identity::ReleaseIdentity;
use super::rollback::current_release;
use super::stage::{Reporter, Stage};
use super::state::{BranchValidated, Classified, Started};
use super::transitions::remove_release;

/// What a finished deploy or rollback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySummary {
    pub app: AppName,
    pub revision: Revision,
    pub port: u16,
    pub method: ReleaseMethod,
    /// Revision `current` pointed at before the cutover.
    pub previous: Option<Revision>,
    pub health_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The push did not update the deploy branch.
    Skipped { refname: String },
    Deployed(DeploySummary),
}

fn at(stage: Stage) -> impl FnOnce(DeployError) -> Error {
    move |source| Error::Stage { stage, source }
}

/// Deploy one pushed ref.
pub async fn deploy<R: Runtime>(
    host: &Host<R>,
    target: &DeployTarget,
    push: &PushRef,
    shutdown: &Shutdown,
    reporter: &dyn Reporter,
    diag: &mut Diagnostics,
) -> Result<DeployOutcome> {
    reporter.stage(Stage::ValidateBranch);
    let validated = Deployment::new(target.clone())
        .validate_branch(host, push)
        .await
        .map_err(at(Stage::ValidateBranch))?;
    let Some(deployment) = validated else {
        return Ok(DeployOutcome::Skipped {
            refname: push.refname.clone(),
        });
    };
    reporter.note(&format!("revision {}", deployment.revision()));

    // A build of the serving revision would recreate its live containers in place.
    if current_release(host, &target.app).await.as_ref() == Some(deployment.revision()) {
        return Err(at(Stage::ValidateBranch)(DeployError::AlreadyServing {
            revision: deployment.revision().clone(),
        }));
    }

    let deployment = prepare(deployment, host, reporter, diag).await?;

    reporter.stage(Stage::BuildAndStart);
    let identity = deployment.identity().clone();
    let deployment = start_or_cancel(
        host,
        &identity,
        deployment.build_and_start(host),
        shutdown,
        Stage::BuildAndStart,
    )
    .await?;

    go_live(deployment, host, shutdown, reporter, diag)
        .await
        .map(DeployOutcome::Deployed)
}

/// Port, checkout, environment and classification.
pub(crate) async fn prepare<R: Runtime>(
    deployment: Deployment<BranchValidated>,
    host: &Host<R>,
    reporter: &dyn Reporter,
    diag: &mut Diagnostics,
) -> Result<Deployment<Classified>> {
    reporter.stage(Stage::AllocatePort);
    let deployment = deployment
        .allocate_port(host)
        .map_err(at(Stage::AllocatePort))?;

    reporter.stage(Stage::Checkout);
    let deployment = deployment
        .checkout(host)
        .await
        .map_err(at(Stage::Checkout))?;

    reporter.stage(Stage::LoadEnvironment);
    let deployment = deployment
        .load_environment(host, diag)
        .map_err(at(Stage::LoadEnvironment))?;

    reporter.stage(Stage::ClassifyServices);
    let deployment = deployment
        .classify()
        .map_err(at(Stage::ClassifyServices))?;

    let classification = deployment.identity().classification();
    reporter.note(&format!(
        "primary {}, {} application, {} infrastructure service(s)",
        classification.primary(),
        classification.application().len(),
        classification.infrastructure().len()
    ));
    Ok(deployment)
}

/// Run a start transition unless a shutdown signal arrives first.
///
/// An interrupted start removes whatever containers of the release already
/// came up.
pub(crate) async fn start_or_cancel<R: Runtime>(
    host: &Host<R>,
    identity: &ReleaseIdentity,
    start: impl Future<Output = std::result::Result<Deployment<Started>, DeployError>>,
    shutdown: &Shutdown,
    stage: Stage,
) -> Result<Deployment<Started>> {
    let mut signal = shutdown.clone();
    tokio::select! {
        biased;
        started = start => started.map_err(at(stage)),
        () = signal.triggered() => {
            tracing::warn!(release = identity.project(), "start interrupted, removing release");
            if let Err(cleanup) = remove_release(host, identity).await {
                tracing::warn!("failed to remove interrupted release: {}", cleanup);
            }
            Err(at(stage)(DeployError::InterruptedStart))
        }
    }
}

/// Health check, cutover and finalize a started release.
///
/// A failed health check or proxy reload removes the new containers and
/// leaves the previous release serving.
pub(crate) async fn go_live<R: Runtime>(
    deployment: Deployment<Started>,
    host: &Host<R>,
    shutdown: &Shutdown,
    reporter: &dyn Reporter,
    diag: &mut Diagnostics,
) -> Result<DeploySummary> {
    reporter.stage(Stage::HealthCheck);
    reporter.note(&format!("waiting for port {}", deployment.port()));
    let deployment = match deployment.health_check(host, shutdown).await {
        Ok(d) => d,
        Err((failed, e)) => {
            reporter.stage(Stage::RollbackNewContainer);
            if let Err(cleanup) = failed.rollback(host).await {
                tracing::warn!("failed to remove new containers: {}", cleanup);
            }
            return Err(at(Stage::HealthCheck)(e));
        }
    };

    reporter.stage(Stage::CutOver);
    let deployment = match deployment.cutover(host, diag).await {
        Ok(d) => d,
        Err((failed, e)) => {
            reporter.stage(Stage::RollbackNewContainer);
            if let Err(cleanup) = failed.rollback(host).await {
                tracing::warn!("failed to remove new containers: {}", cleanup);
            }
            return Err(at(Stage::CutOver)(e));
        }
    };

    reporter.stage(Stage::Finalize);
    let deployment = deployment
        .finalize(host, diag)
        .await
        .map_err(at(Stage::Finalize))?;

    Ok(deployment.finish())
}
