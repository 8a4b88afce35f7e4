// ABOUTME: Entry point for the mushak CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, RouteAction};
use mushak::config::{PushRef, parse_domain};
use mushak::error::Result;
use mushak::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, Output::new(mode)).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: Output) -> Result<()> {
    let layout = cli.roots.layout();
    let force = cli.force;

    match cli.command {
        Commands::Receive { target } => {
            commands::receive(target.target()?, layout, force, output).await
        }
        Commands::Deploy {
            target,
            old,
            new,
            refname,
        } => {
            let push = PushRef::new(&old, &new, &refname);
            commands::deploy(target.target()?, push, layout, force, output).await
        }
        Commands::Versions { app } => commands::versions(&app.app()?, layout, output).await,
        Commands::Rollback { target, revision } => {
            commands::rollback(target.target()?, &revision, layout, force, output).await
        }
        Commands::Route { action } => match action {
            RouteAction::Set { app, domain, port } => {
                let domain = parse_domain(&domain)?;
                commands::route_set(&app.app()?, &domain, port, layout, output).await
            }
            RouteAction::Remove { app } => commands::route_remove(&app.app()?, layout, output).await,
        },
        Commands::ProxyInit { no_reload } => commands::proxy_init(layout, !no_reload, output).await,
        Commands::Destroy { app } => commands::destroy(&app.app()?, layout, force, output).await,
    }
}
