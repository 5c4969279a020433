use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storage_gateway::config::{BackendMode, GatewayConfig, LogFormat};
use storage_gateway::routes::create_router;
use storage_gateway::{AppState, AzureAccount, MemoryAccount, StorageAccount};

#[derive(Parser, Debug)]
#[command(name = "storage-gateway")]
#[command(about = "HTTP gateway for Azure Storage queue, table, blob and file writes")]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "STORAGE_GATEWAY_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "STORAGE_GATEWAY_BIND")]
    bind: Option<String>,

    /// Storage backend
    #[arg(long, value_enum, env = "STORAGE_GATEWAY_BACKEND")]
    backend: Option<BackendMode>,

    /// Azure Storage connection string
    #[arg(long)]
    connection_string: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, env = "STORAGE_GATEWAY_VERBOSE")]
    verbose: bool,

    /// Config file path (optional)
    #[arg(short, long, env = "STORAGE_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        if let Some(connection_string) = &self.connection_string {
            config.storage.connection_string = Some(connection_string.clone());
        }
    }
}

fn default_filter(config: &GatewayConfig, verbose: bool) -> String {
    if verbose {
        "storage_gateway=debug,tower_http=debug".to_string()
    } else {
        format!("storage_gateway={},tower_http=info", config.logging.level)
    }
}

fn init_tracing(config: &GatewayConfig, verbose: bool) {
    let filter = default_filter(config, verbose);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.into());

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

async fn serve<A: StorageAccount>(account: A, config: GatewayConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid bind address")?;

    let app = create_router(AppState::with_config(account, config));

    info!("Starting storage gateway on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = GatewayConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    if cli.print_config {
        print!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    init_tracing(&config, cli.verbose);

    match config.storage.backend {
        BackendMode::Azure => {
            let connection_string = config.storage.resolve_connection_string()?;
            let account = AzureAccount::from_connection_string(&connection_string)
                .context("invalid storage connection string")?
                .with_queue_encoding(config.storage.queue_message_encoding);
            info!(
                "Using Azure Storage account {}",
                account.settings().account().unwrap_or("(sas)")
            );
            serve(account, config).await
        }
        BackendMode::Memory => {
            info!("Using in-memory storage; data is lost on exit");
            serve(MemoryAccount::new(), config).await
        }
    }
}
