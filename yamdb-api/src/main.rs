//! YaMDb API server
//!
//! Serves the review catalog over HTTP, or bootstraps an admin account.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yamdb_api::{build_router, AppState};
use yamdb_common::auth::{load_signing_secret, TokenSigner};
use yamdb_common::config::{
    database_path, ensure_root_folder, resolve_root_folder, ConfigSource, TomlConfig,
};
use yamdb_common::db::init_database;
use yamdb_common::db::users::{self, NewUser};
use yamdb_common::mail;
use yamdb_common::permissions::Role;

#[derive(Parser, Debug)]
#[command(name = "yamdb-api")]
#[command(about = "YaMDb review catalog API server")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to the platform config location)
    #[arg(short, long, env = "YAMDB_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP port, overrides the config file
    #[arg(short, long, env = "YAMDB_PORT")]
    port: Option<u16>,

    /// Root folder holding the database; YAMDB_ROOT_FOLDER is consulted next
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create an admin account; it signs in through the normal signup flow
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) =
        TomlConfig::load_with_source(args.config.as_deref()).context("Failed to load configuration")?;

    let default_filter = format!(
        "yamdb_api={level},yamdb_common={level},tower_http={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting YaMDb API v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &source {
        ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigSource::Defaults => warn!("No configuration file found, using built-in defaults"),
    }
    config.validate().context("Invalid configuration")?;

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), config.root_folder.as_deref());
    ensure_root_folder(&root_folder).context("Failed to create root folder")?;
    info!("Root folder: {}", root_folder.display());

    let db_path = database_path(&root_folder);
    let db = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(db, config, root_folder, args.port).await,
        Command::CreateAdmin { username, email } => create_admin(&db, username, email).await,
    }
}

async fn serve(
    db: SqlitePool,
    config: TomlConfig,
    root_folder: PathBuf,
    port_override: Option<u16>,
) -> Result<()> {
    let secret = load_signing_secret(&db, config.auth.signing_secret.as_deref())
        .await
        .context("Failed to load token signing secret")?;
    let signer = TokenSigner::new(secret.as_bytes(), config.auth.token_lifetime_minutes);

    let mailer = mail::from_config(&config.mail, config.outbox_dir(&root_folder));
    info!("Mail backend: {:?}", config.mail.backend);

    let port = port_override.unwrap_or(config.port);
    let addr: SocketAddr = format!("{}:{}", config.bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_address, port))?;

    let state = AppState::new(db, config, mailer, signer);
    let app = build_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn create_admin(db: &SqlitePool, username: String, email: String) -> Result<()> {
    let user = users::create_user(
        db,
        NewUser {
            username: Some(username),
            email: Some(email),
            role: Some(Role::Admin.as_str().to_string()),
            ..NewUser::default()
        },
    )
    .await
    .context("Failed to create admin account")?;

    info!(
        "Admin '{}' created; request a confirmation code via POST /api/v1/auth/signup/",
        user.username
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
