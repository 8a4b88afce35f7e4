// ABOUTME: Proxy route commands.
// ABOUTME: Sets or removes one app's Caddy route and prepares the top-level Caddyfile.

use mushak::error::Result;
use mushak::layout::Layout;
use mushak::output::Output;
use mushak::proxy::ProxyManager;
use mushak::types::AppName;

pub async fn route_set(
    app: &AppName,
    domain: &str,
    port: u16,
    layout: Layout,
    output: Output,
) -> Result<()> {
    ProxyManager::caddy(&layout)
        .set_route(app, domain, port)
        .await?;
    output.success(&format!("Routed {domain} to localhost:{port}"));
    Ok(())
}

pub async fn route_remove(app: &AppName, layout: Layout, output: Output) -> Result<()> {
    ProxyManager::caddy(&layout).remove_route(app).await?;
    output.success(&format!("Removed route for {app}"));
    Ok(())
}

pub async fn proxy_init(layout: Layout, reload: bool, output: Output) -> Result<()> {
    let proxy = ProxyManager::caddy(&layout);

    if proxy.ensure_root_config()? {
        output.progress(&format!("Wrote {}", layout.caddyfile.display()));
    }
    if reload {
        proxy.reload().await?;
    }

    output.success(&format!(
        "{} imports routes from {}",
        layout.caddyfile.display(),
        layout.routes_dir.display()
    ));
    Ok(())
}
