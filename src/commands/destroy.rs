// ABOUTME: Destroy command implementation.
// ABOUTME: Removes every managed container of an app and its route; files and volumes stay.

use mushak::deploy::{self, DeployLock, Host};
use mushak::diagnostics::Diagnostics;
use mushak::error::Result;
use mushak::layout::Layout;
use mushak::output::Output;
use mushak::types::AppName;

use super::{release_lock, report_warnings};

pub async fn destroy(app: &AppName, layout: Layout, force: bool, output: Output) -> Result<()> {
    let host = Host::local(layout).await?;
    let mut diag = Diagnostics::default();

    let lock = DeployLock::acquire(&host.layout, app, force)?;
    let result = deploy::destroy(&host, app, &mut diag).await;
    release_lock(lock, &mut diag);
    report_warnings(&output, &diag);

    let teardown = result?;
    output.success(&format!(
        "Removed {} container(s) of {}",
        teardown.containers_removed, app
    ));
    Ok(())
}
