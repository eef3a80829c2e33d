//! Tenant Key Auth - Main Application Entry Point
//!
//! An API-key authentication service for multi-tenant backends. Tenants hold
//! API keys that are stored only as bcrypt hashes; every private request is
//! authorized by resolving its key to a tenant, and tenant secrets are kept
//! encrypted at rest with AES-256-GCM.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: API key with prefix lookup and bcrypt verification
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Derive the encryption key (refuses to start without one)
//! 3. Create database connection pool
//! 4. Run database migrations
//! 5. Serve HTTP, or run a one-off administrative command

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::{
    services::{
        api_key_service::ApiKeyManager,
        credential_store::PgCredentialStore,
        secret_protection::{EncryptionKey, SecretProtection},
        tenant_service::{PgTenantStore, TenantService},
    },
    state::AppState,
};

#[derive(Debug, Parser)]
#[command(name = "tenant-key-auth", version, about = "Tenant-scoped API key authentication")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a tenant and print its id
    CreateTenant {
        #[arg(long)]
        name: String,
    },
    /// Issue an API key for a tenant and print it once
    IssueKey {
        #[arg(long)]
        tenant_id: Uuid,
        #[arg(long)]
        label: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Fatal: never run with settings we cannot encrypt
    let key = EncryptionKey::derive(config.encryption_key.as_deref())?;
    let protection = Arc::new(SecretProtection::new(&key));
    tracing::info!("Encryption key derived");

    let pool = db::create_pool(&config).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let state = AppState {
        api_keys: ApiKeyManager::new(
            Arc::new(PgCredentialStore::new(pool.clone())),
            config.api_key_bcrypt_cost,
        )
        .with_max_candidates(config.api_key_max_candidates as usize),
        tenants: TenantService::new(Arc::new(PgTenantStore::new(pool)), protection),
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, config.server_port).await,
        Command::CreateTenant { name } => {
            let tenant = state.tenants.create_tenant(&name).await?;
            println!("{}", tenant.id);
            Ok(())
        }
        Command::IssueKey { tenant_id, label } => {
            let issued = state.api_keys.generate(tenant_id, &label).await?;
            println!("id:     {}", issued.id);
            println!("prefix: {}", issued.prefix);
            println!("key:    {}", issued.key);
            eprintln!("Store this key now; it cannot be shown again.");
            Ok(())
        }
    }
}

async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
