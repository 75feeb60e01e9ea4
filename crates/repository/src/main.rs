//! SIO Repository Server
//!
//! Serves the repository API, and carries two maintenance commands: key
//! generation and the deployment manifest check.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sio_repository::{
    config::{AppConfig, DatabaseConfig, LogFormat, MongoConfig, StoreKind},
    crypto::Encryptor,
    db,
    deploy,
    files::FileStore,
    identity::{public_key_path, ServerIdentity},
    router::build_router,
    state::AppState,
    store::{
        MemoryOrganizationStore, MongoOrganizationStore, OrganizationStore, PgOrganizationStore,
    },
    ResultExt,
};

#[derive(Parser)]
#[command(name = "sio-repository")]
#[command(author, version, about = "SIO secure document repository server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the repository server (default)
    Serve,

    /// Generate a repository signing key and its public key
    Keygen {
        /// Private key output path (defaults to SIO_KEY_FILE)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Check a deployment manifest and the build recipes it references
    CheckDeploy {
        /// Path to the compose manifest
        #[arg(default_value = "docker-compose.yml")]
        manifest: PathBuf,
    },
}

/// Initialize tracing/logging.
fn init_tracing(format: LogFormat) {
    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sio_repository=debug,tower_http=debug".into()),
        )
        .with(text)
        .with(json)
        .init();
}

fn load_config() -> AppConfig {
    AppConfig::from_env()
        .log_warn("loading app config, using defaults")
        .unwrap_or_default()
}

/// Open the configured organization store.
async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn OrganizationStore>> {
    match config.store {
        StoreKind::Mongo => {
            let mongo_config = MongoConfig::from_env()
                .log_warn("loading mongo config, using defaults")
                .unwrap_or_default();
            Ok(Arc::new(MongoOrganizationStore::connect(&mongo_config).await?))
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory organization store, data is lost on exit");
            Ok(Arc::new(MemoryOrganizationStore::new()))
        }
        StoreKind::Postgres => {
            let db_config = DatabaseConfig::from_env()
                .log_warn("loading database config, using defaults")
                .unwrap_or_default();
            let pool = db::connect(&db_config).await?;
            Ok(Arc::new(PgOrganizationStore::new(pool)))
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting SIO Repository"
    );

    let config = load_config();
    tracing::info!(
        host = %config.host,
        port = config.port,
        store = ?config.store,
        files = %config.files_location,
        debug = config.debug,
        "Configuration loaded"
    );

    let store = open_store(&config).await?;

    let file_store = FileStore::new(&config.files_location);
    file_store.init().await?;

    let identity = ServerIdentity::load_or_create(&config.key_file)?;
    let encryptor = Encryptor::from_base64(&config.encryption_key_or_default())?;

    let addr: SocketAddr = config.bind_address().parse()?;
    let sweep_interval = Duration::from_secs(config.session_sweep_interval.max(1));

    let state = AppState::new(config, store, file_store, identity, encryptor);
    let sweeper = state.sessions.start_sweeper(sweep_interval);

    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server shutdown complete");

    Ok(())
}

fn keygen(out: Option<PathBuf>) -> anyhow::Result<()> {
    let path = out.unwrap_or_else(|| PathBuf::from(load_config().key_file));
    if path.exists() {
        anyhow::bail!("{} already exists, refusing to overwrite", path.display());
    }

    let identity = ServerIdentity::generate()?;
    identity.write(&path)?;
    println!("Private key: {}", path.display());
    println!("Public key:  {}", public_key_path(&path).display());
    Ok(())
}

fn check_deploy(manifest: PathBuf) -> anyhow::Result<()> {
    let report = deploy::run_checks(&manifest)?;

    for finding in &report.findings {
        let mark = if finding.passed { "ok" } else { "FAIL" };
        println!("[{:>4}] {:<16} {}", mark, finding.check, finding.detail);
    }

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} deployment check(s) failed", failed);
    }
    println!("All {} deployment checks passed", report.findings.len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    // Tracing is not up yet; a bad config is reported again by `load_config`.
    let log_format = AppConfig::from_env()
        .map(|config| config.log_format)
        .unwrap_or_default();
    init_tracing(log_format);

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Keygen { out } => keygen(out),
        Commands::CheckDeploy { manifest } => check_deploy(manifest),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
