// ABOUTME: Command handlers behind the mushak CLI.
// ABOUTME: Each handler wires the local host to one engine operation and reports through Output.

mod deploy;
mod destroy;
mod rollback;
mod route;
mod versions;

pub use deploy::{deploy, receive};
pub use destroy::destroy;
pub use rollback::rollback;
pub use route::{proxy_init, route_remove, route_set};
pub use versions::versions;

use mushak::deploy::DeployLock;
use mushak::diagnostics::{Diagnostics, Warning};
use mushak::output::Output;

/// Release the deploy lock; a failure only leaves a stale lock behind.
fn release_lock(lock: DeployLock, diag: &mut Diagnostics) {
    let path = lock.path().to_path_buf();
    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(format!(
            "failed to release deploy lock {}: {}",
            path.display(),
            e
        )));
    }
}

fn report_warnings(output: &Output, diag: &Diagnostics) {
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }
}
