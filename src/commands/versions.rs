// ABOUTME: Versions command implementation.
// ABOUTME: Lists restorable releases as a table, or as JSON in json mode.

use serde::Serialize;

use mushak::deploy::{Host, Version, list_versions};
use mushak::error::Result;
use mushak::layout::Layout;
use mushak::output::{Output, OutputMode};
use mushak::types::AppName;

#[derive(Serialize)]
struct VersionRow<'a> {
    revision: &'a str,
    timestamp: &'a str,
    port: Option<u16>,
    method: String,
    current: bool,
    checkout: bool,
}

impl<'a> From<&'a Version> for VersionRow<'a> {
    fn from(version: &'a Version) -> Self {
        Self {
            revision: version.revision.as_str(),
            timestamp: &version.timestamp,
            port: version.port,
            method: version.method.to_string(),
            current: version.is_current,
            checkout: version.has_checkout,
        }
    }
}

pub async fn versions(app: &AppName, layout: Layout, output: Output) -> Result<()> {
    let host = Host::local(layout).await?;
    let versions = list_versions(&host, app).await?;

    match output.mode() {
        OutputMode::Json => {
            let rows: Vec<VersionRow<'_>> = versions.iter().map(VersionRow::from).collect();
            output.data(&rows);
        }
        OutputMode::Quiet => {
            for version in &versions {
                output.line(version.revision.as_str());
            }
        }
        OutputMode::Normal => {
            if versions.is_empty() {
                output.line(&format!("No restorable versions of {app}"));
                return Ok(());
            }
            output.line(&format!(
                "{:<10} {:<16} {:<6} {:<9} {}",
                "REVISION", "DEPLOYED", "PORT", "METHOD", ""
            ));
            for version in &versions {
                let port = version
                    .port
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let marker = if version.is_current { "(current)" } else { "" };
                output.line(
                    format!(
                        "{:<10} {:<16} {:<6} {:<9} {}",
                        version.revision, version.timestamp, port, version.method, marker
                    )
                    .trim_end(),
                );
            }
        }
    }
    Ok(())
}
