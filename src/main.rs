//! Linkmesh CLI - GRE/VXLAN links between SSH-managed hosts
//!
//! Runs the REST API over a SQL registry, or talks to a single host
//! directly to check that it can be managed.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use linkmesh_api::{ApiServer, ApiServerConfig};
use linkmesh_core::{
    Credential, DiagnosticsConfig, Orchestrator, OrchestratorConfig, SshShell, SshTarget,
};
use linkmesh_db::SeaOrmRegistry;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Linkmesh - provision overlay tunnels between remote hosts
#[derive(Parser, Debug)]
#[command(name = "linkmesh")]
#[command(about = "Linkmesh - provision GRE and VXLAN tunnels between SSH-managed hosts")]
#[command(version)]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the REST API
    #[command(long_about = r#"
Run the REST API and Swagger UI on top of a SQL registry. Migrations are
applied on start-up.

EXAMPLES:
  # Local SQLite file
  linkmesh serve --database-url "sqlite://linkmesh.db?mode=rwc"

  # Shared Postgres, reachable from the LAN
  linkmesh serve --bind 0.0.0.0:8080 \
    --database-url postgres://linkmesh:secret@db/linkmesh

ENVIRONMENT VARIABLES:
  LINKMESH_BIND             Address for the HTTP listener
  LINKMESH_DATABASE_URL     Registry database
  LINKMESH_CONNECT_TIMEOUT  SSH connect timeout in seconds
    "#)]
    Serve(ServeArgs),

    /// Check SSH reachability of a host, optionally running one command
    Probe(ProbeArgs),

    /// Apply database migrations and exit
    Migrate {
        /// Registry database URL
        #[arg(long, env = "LINKMESH_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },
}

const DEFAULT_DATABASE_URL: &str = "sqlite://linkmesh.db?mode=rwc";

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address for the HTTP listener
    #[arg(long, env = "LINKMESH_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Registry database URL (sqlite:// or postgres://)
    #[arg(long, env = "LINKMESH_DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    /// SSH connect timeout in seconds
    #[arg(long, env = "LINKMESH_CONNECT_TIMEOUT", default_value = "10")]
    connect_timeout: u64,

    /// Echo requests sent by the ping diagnostic
    #[arg(long, env = "LINKMESH_PING_COUNT", default_value = "4")]
    ping_count: u32,

    /// Ping destination when no target node is given
    #[arg(long, env = "LINKMESH_PING_FALLBACK", default_value = "1.1.1.1")]
    ping_fallback: String,

    /// Duration of the throughput diagnostic in seconds
    #[arg(long, env = "LINKMESH_THROUGHPUT_SECONDS", default_value = "5")]
    throughput_seconds: u32,

    /// Disable CORS for localhost origins
    #[arg(long)]
    no_cors: bool,
}

#[derive(Args, Debug)]
struct ProbeArgs {
    /// Host name or IP address
    host: String,

    /// SSH port
    #[arg(short, long, default_value = "22")]
    port: u16,

    /// SSH user
    #[arg(short, long, env = "LINKMESH_SSH_USER", default_value = "root")]
    username: String,

    /// Password (prefer the environment variable)
    #[arg(long, env = "LINKMESH_SSH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Private key file
    #[arg(long, conflicts_with = "password")]
    key_file: Option<PathBuf>,

    /// Passphrase for the private key
    #[arg(long, env = "LINKMESH_SSH_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// SSH connect timeout in seconds
    #[arg(long, env = "LINKMESH_CONNECT_TIMEOUT", default_value = "10")]
    connect_timeout: u64,

    /// Command to run after connecting; its combined output is printed
    #[arg(short, long)]
    command: Option<String>,
}

fn setup_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();
}

async fn serve(args: ServeArgs) -> Result<()> {
    info!("Linkmesh starting...");

    let db = linkmesh_db::connect(&args.database_url)
        .await
        .with_context(|| format!("Failed to connect to {}", args.database_url))?;
    linkmesh_db::migrate(&db)
        .await
        .context("Failed to run database migrations")?;

    let config = OrchestratorConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout),
        diagnostics: DiagnosticsConfig {
            ping_count: args.ping_count,
            fallback_ping_target: args.ping_fallback,
            throughput_seconds: args.throughput_seconds,
        },
    };

    let orchestrator = Orchestrator::new(Arc::new(SeaOrmRegistry::new(db)), Arc::new(SshShell))
        .with_config(config);

    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr: args.bind,
            enable_cors: !args.no_cors,
        },
        Arc::new(orchestrator),
    );

    tokio::select! {
        result = server.start() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn probe(args: ProbeArgs) -> Result<()> {
    let credential = match (args.password, args.key_file) {
        (_, Some(path)) => {
            let pem = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read key file {}", path.display()))?;
            Credential::private_key(pem, args.passphrase)
        }
        (Some(password), None) => Credential::password(password),
        (None, None) => bail!("Either --password or --key-file is required"),
    };

    let target = SshTarget::new(args.host, args.port, args.username, credential)
        .with_connect_timeout(Duration::from_secs(args.connect_timeout));

    match args.command {
        Some(command) => {
            let output = linkmesh_ssh::execute(&target, &command)
                .await
                .with_context(|| format!("Failed to run command on {}", target.address()))?;
            print!("{}", output);
        }
        None => {
            if !linkmesh_ssh::probe(&target).await {
                bail!("SSH connection to {} failed", target.address());
            }
            info!("SSH connection to {} succeeded", target.address());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Probe(args) => probe(args).await,
        Commands::Migrate { database_url } => {
            let db = linkmesh_db::connect(&database_url)
                .await
                .with_context(|| format!("Failed to connect to {}", database_url))?;
            linkmesh_db::migrate(&db)
                .await
                .context("Failed to run database migrations")
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
