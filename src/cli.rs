// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use mushak::config::{DeployTarget, TargetError};
use mushak::layout::{
    DEFAULT_APPS_ROOT, DEFAULT_CADDYFILE, DEFAULT_REPOS_ROOT, DEFAULT_ROUTES_DIR, Layout,
};
use mushak::types::{AppName, AppNameError};

#[derive(Parser)]
#[command(name = "mushak")]
#[command(about = "Git-push deployments of compose apps behind Caddy")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Break an existing deploy lock
    #[arg(long, global = true)]
    pub force: bool,

    #[command(flatten)]
    pub roots: Roots,

    #[command(subcommand)]
    pub command: Commands,
}

/// Filesystem roots, overridable for staging hosts and tests.
#[derive(Args, Clone)]
pub struct Roots {
    /// Directory holding one directory per app
    #[arg(long, global = true, env = "MUSHAK_APPS_ROOT", default_value = DEFAULT_APPS_ROOT)]
    pub apps_root: PathBuf,

    /// Directory of per-app Caddy route files
    #[arg(long, global = true, env = "MUSHAK_ROUTES_DIR", default_value = DEFAULT_ROUTES_DIR)]
    pub routes_dir: PathBuf,

    /// Top-level Caddyfile
    #[arg(long, global = true, env = "MUSHAK_CADDYFILE", default_value = DEFAULT_CADDYFILE)]
    pub caddyfile: PathBuf,

    /// Directory of bare git repositories
    #[arg(long, global = true, env = "MUSHAK_REPOS_ROOT", default_value = DEFAULT_REPOS_ROOT)]
    pub repos_root: PathBuf,
}

impl Roots {
    pub fn layout(&self) -> Layout {
        Layout {
            apps_root: self.apps_root.clone(),
            routes_dir: self.routes_dir.clone(),
            caddyfile: self.caddyfile.clone(),
            repos_root: self.repos_root.clone(),
        }
    }
}

#[derive(Args, Clone)]
pub struct AppArgs {
    /// App name
    #[arg(long, env = "MUSHAK_APP")]
    pub app: String,
}

impl AppArgs {
    pub fn app(&self) -> Result<AppName, AppNameError> {
        AppName::new(&self.app)
    }
}

#[derive(Args, Clone)]
pub struct TargetArgs {
    /// App name
    #[arg(long, env = "MUSHAK_APP")]
    pub app: String,

    /// Domain the app is served on
    #[arg(long, env = "MUSHAK_DOMAIN")]
    pub domain: String,

    /// Branch whose pushes are deployed
    #[arg(long, env = "MUSHAK_BRANCH", default_value = "main")]
    pub branch: String,
}

impl TargetArgs {
    pub fn target(&self) -> Result<DeployTarget, TargetError> {
        DeployTarget::new(&self.app, &self.domain, &self.branch)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy pushes read from stdin (git post-receive format)
    Receive {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Deploy one pushed ref
    Deploy {
        #[command(flatten)]
        target: TargetArgs,

        /// Revision before the push
        old: String,

        /// Pushed revision
        new: String,

        /// Pushed ref, e.g. refs/heads/main
        refname: String,
    },

    /// List versions that can be rolled back to
    Versions {
        #[command(flatten)]
        app: AppArgs,
    },

    /// Restore a previous version from its image
    Rollback {
        #[command(flatten)]
        target: TargetArgs,

        /// Revision to restore
        revision: String,
    },

    /// Manage an app's proxy route
    Route {
        #[command(subcommand)]
        action: RouteAction,
    },

    /// Make the top-level Caddyfile import the per-app routes
    ProxyInit {
        /// Write the Caddyfile without reloading Caddy
        #[arg(long)]
        no_reload: bool,
    },

    /// Remove every container and the route of an app
    Destroy {
        #[command(flatten)]
        app: AppArgs,
    },
}

#[derive(Subcommand)]
pub enum RouteAction {
    /// Point a domain at a local port
    Set {
        #[command(flatten)]
        app: AppArgs,

        #[arg(long)]
        domain: String,

        #[arg(long)]
        port: u16,
    },

    /// Delete the app's route
    Remove {
        #[command(flatten)]
        app: AppArgs,
    },
}
