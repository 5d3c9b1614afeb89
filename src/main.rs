//! Graphmem CLI - knowledge graph memory over Postgres, MySQL or SQLite

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use graphmem::config::{self, BackendKind, DatabaseConfig, GraphmemConfig, TlsMode};
use graphmem::server;
use graphmem::server::mcp::McpService;
use graphmem::service::Service;
use graphmem::storage::Store;

#[derive(Parser)]
#[command(name = "graphmem")]
#[command(version = "0.1.0")]
#[command(about = "Knowledge graph memory for agents, backed by your own database")]
#[command(long_about = r#"
Graphmem stores a knowledge graph of entities, observations and typed
relations in Postgres, MySQL or SQLite, and exposes it to agents over
MCP (stdio) and a plain HTTP API.

Example usage:
  graphmem --db-type sqlite --db-address graphmem.db serve
  graphmem --db-type postgres --db-address localhost --db-database memory stdio
  graphmem --config graphmem.toml migrate
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a TOML config file (defaults to graphmem.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database type: postgres, mysql or sqlite
    #[arg(long, global = true)]
    db_type: Option<BackendKind>,

    /// Database host, or file path for sqlite
    #[arg(long, global = true)]
    db_address: Option<String>,

    /// Database port
    #[arg(long, global = true)]
    db_port: Option<u16>,

    /// Database user
    #[arg(long, global = true)]
    db_user: Option<String>,

    /// Database password
    #[arg(long, global = true)]
    db_password: Option<String>,

    /// Database name
    #[arg(long, global = true)]
    db_database: Option<String>,

    /// TLS mode: disable, enable or require
    #[arg(long, global = true)]
    db_tls_mode: Option<TlsMode>,

    /// Path to a CA certificate in PEM format
    #[arg(long, global = true)]
    db_tls_ca_cert: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to bind (defaults to 127.0.0.1:8080)
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Speak MCP over stdio
    Stdio,

    /// Apply the schema and exit
    Migrate,
}

impl Cli {
    /// Config file first, flags on top.
    fn database_config(&self, file: &GraphmemConfig) -> anyhow::Result<DatabaseConfig> {
        let base = file.database.clone();

        let backend = self
            .db_type
            .or(base.as_ref().map(|d| d.backend))
            .ok_or_else(|| anyhow::anyhow!("no database type set (--db-type or config file)"))?;

        let base = base.unwrap_or(DatabaseConfig {
            backend,
            address: String::new(),
            port: None,
            user: None,
            password: None,
            database: String::new(),
            tls_mode: TlsMode::Disable,
            tls_ca_cert: None,
        });

        Ok(DatabaseConfig {
            backend,
            address: self.db_address.clone().unwrap_or(base.address),
            port: self.db_port.or(base.port),
            user: self.db_user.clone().or(base.user),
            password: self.db_password.clone().or(base.password),
            database: self.db_database.clone().unwrap_or(base.database),
            tls_mode: self.db_tls_mode.unwrap_or(base.tls_mode),
            tls_ca_cert: self.db_tls_ca_cert.clone().or(base.tls_ca_cert),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let file = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let db = cli.database_config(&file)?;

    tracing::info!(backend = %db.backend, "connecting to database");
    let store = Store::connect(&db).await?;
    store.migrate().await?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = match bind {
                Some(bind) => bind,
                None => file
                    .http_bind
                    .as_deref()
                    .unwrap_or("127.0.0.1:8080")
                    .parse()?,
            };
            let service = Service::new(store);
            server::start_server(bind, service).await?;
        }

        Commands::Stdio => {
            let service = Service::new(store);
            McpService::new(service).run_stdio().await?;
        }

        Commands::Migrate => {
            println!("Schema applied for {} backend", db.backend);
            store.close().await;
        }
    }

    Ok(())
}
