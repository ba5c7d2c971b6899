mod config;
mod graphql;
mod http;
mod session;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use entity::users;
use platform_backend::{
    BackendClient, BackendSettings, MemoryTransport, RestTransport, Transport as _,
};
use platform_obs::{ObsConfig, init_tracing};
use tracing::info;

use crate::{
    config::{AppConfig, SeedAdmin},
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "projectdesk", version, about = "ProjectDesk project tracking server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Check that the hosted backend is configured and reachable.
    Check,
    /// Print the GraphQL schema in SDL form.
    #[command(name = "schema:print")]
    SchemaPrint {
        #[arg(long, value_name = "FILE", help = "Destination file path")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Keep all data in process instead of the hosted backend. Nothing
    /// survives a restart.
    #[arg(long, env = "PROJECTDESK_IN_MEMORY")]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(cmd) => run_server(cmd).await,
        Command::Check => check_backend().await,
        Command::SchemaPrint { output } => schema_print(output),
    }
}

fn schema_print(path: Option<PathBuf>) -> Result<()> {
    let sdl = graphql::build_schema().sdl();
    match path {
        Some(target) => {
            std::fs::write(&target, sdl)
                .with_context(|| format!("failed to write {}", target.display()))?;
            info!(path = %target.display(), "schema written");
        }
        None => println!("{sdl}"),
    }
    Ok(())
}

fn remote_backend() -> Result<BackendClient> {
    let settings = BackendSettings::from_env()?;
    let transport = RestTransport::new(&settings)?;
    Ok(BackendClient::new(Arc::new(transport), settings.bucket))
}

async fn check_backend() -> Result<()> {
    let backend = remote_backend()?;
    backend
        .transport()
        .health()
        .await
        .context("backend check failed")?;
    info!("backend reachable");
    Ok(())
}

/// In-memory backend with one approved administrator so the app is usable
/// straight away.
async fn memory_backend(seed: &SeedAdmin) -> Result<BackendClient> {
    let memory = Arc::new(MemoryTransport::new());
    let client = BackendClient::new(memory.clone(), platform_backend::DEFAULT_BUCKET);
    let id = memory.seed_account(&seed.email, &seed.password, "Administrator");
    let mut admin = users::Draft::pending(id, "Administrator", &seed.email);
    admin.role = users::Role::Admin;
    admin.approved = true;
    client
        .insert_one::<users::Model, _>(&admin)
        .await
        .context("failed to seed administrator")?;
    info!(email = %seed.email, "in-memory backend seeded with administrator");
    Ok(client)
}

async fn run_server(cmd: ServeCommand) -> Result<()> {
    let config = Arc::new(AppConfig::load(cmd.in_memory)?);
    let backend = if cmd.in_memory {
        memory_backend(&config.seed_admin).await?
    } else {
        remote_backend()?
    };
    let state = AppState::new(backend, config);
    http::serve(ServeConfig::new(cmd.host, cmd.port), state).await
}
