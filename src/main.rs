use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod commands;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(name = "tailwatch")]
#[command(about = "Aircraft approach tracking and notifications")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking service
    Run {
        /// Config file (defaults to TAILWATCH_CONFIG, then /etc/tailwatch or ./tailwatch.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Load and validate the config file, then print a summary
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Send a test notification through a tenant's enabled channels
    TestChannel {
        /// Tenant id
        #[arg(long)]
        tenant: Uuid,

        /// Only this channel kind (discord, slack, teams, email)
        #[arg(long)]
        kind: Option<String>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tailwatch=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => commands::handle_run(config).await,
        Commands::CheckConfig { config } => commands::handle_check_config(config),
        Commands::TestChannel {
            tenant,
            kind,
            config,
        } => commands::handle_test_channel(config, tenant, kind).await,
    }
}
