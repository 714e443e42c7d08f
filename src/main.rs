//! Marketplace API - procurement opportunities for digital work
//!
//! Government buyers post Code With Us, Sprint With Us and Team With Us
//! opportunities; vendors and their organizations respond with proposals
//! that move through each program's evaluation workflow until an award.
//!
//! A background closer moves opportunities into evaluation once their
//! proposal deadline passes.

mod auth;
mod closer;
mod config;
mod db;
mod error;
mod lifecycle;
mod models;
mod permissions;
mod routes;
mod state;

use crate::config::{DatabaseConfig, Settings, StorageBackend};
use crate::db::{MemoryStore, PgStore, Store};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(settings.json_logs);

    info!("🚀 Starting Marketplace API...");
    info!("📋 Configuration loaded successfully");

    if settings.auth.jwt_secret == config::AuthConfig::default().jwt_secret {
        warn!("⚠️  JWT_SECRET not set, using default (INSECURE - set in production!)");
    }

    let store: Arc<dyn Store> = match settings.storage {
        StorageBackend::Memory => {
            warn!("⚠️  Using in-memory storage; records are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Postgres => {
            let pool = init_database_pool(&settings.database).await.map_err(|e| {
                error!("❌ FATAL: Failed to initialize database pool: {}", e);
                e
            })?;
            info!("✅ Database pool created successfully");

            let store = PgStore::new(pool);
            store.migrate().await?;
            Arc::new(store)
        }
    };

    let _closer = closer::spawn(store.clone(), settings.closer.interval);
    info!("⏰ Closing due opportunities every {:?}", settings.closer.interval);

    let state = Arc::new(AppState::new(store, &settings));
    let app = create_router(state, &settings);

    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("📚 API Endpoints:");
    info!("   ─── Accounts ───");
    info!("   POST   /api/sessions                 - Sign in");
    info!("   GET    /api/sessions/current         - Current session");
    info!("   POST   /api/users                    - Sign up");
    info!("   ─── Vendors ───");
    info!("   POST   /api/organizations            - Create organization");
    info!("   POST   /api/affiliations             - Invite member");
    info!("   ─── Procurement ───");
    info!("   GET    /api/opportunities/{{program}}  - List opportunities");
    info!("   PUT    /api/opportunities/{{program}}/{{id}} - Opportunity actions");
    info!("   POST   /api/proposals/{{program}}      - Create proposal");
    info!("   PUT    /api/proposals/{{program}}/{{id}} - Proposal actions");
    info!("   POST   /api/evaluations/team-with-us - Panel evaluation");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,marketplace_api=debug,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .compact(),
            )
            .init();
    }
}

/// Build the connection pool and check it can reach the server
async fn init_database_pool(database: &DatabaseConfig) -> anyhow::Result<deadpool_postgres::Pool> {
    use deadpool_postgres::{Config, ManagerConfig, PoolConfig, RecyclingMethod, Runtime};

    let mut cfg = Config::new();
    cfg.host = Some(database.host.clone());
    cfg.port = Some(database.port);
    cfg.user = Some(database.user.clone());
    cfg.password = Some(database.password.clone());
    cfg.dbname = Some(database.database.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(database.max_pool_size));

    let pool = if database.require_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| anyhow::anyhow!("Failed to create TLS pool: {}", e))?
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), tokio_postgres::NoTls)
            .map_err(|e| anyhow::anyhow!("Failed to create pool: {}", e))?
    };

    let client = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get pool connection: {}", e))?;
    client
        .query_one("SELECT 1 AS ok", &[])
        .await
        .map_err(|e| anyhow::anyhow!("Failed to verify database connection: {}", e))?;

    info!(
        "✅ Database connection successful ({}:{}/{}, TLS: {})",
        database.host, database.port, database.database, database.require_tls
    );
    Ok(pool)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Failed to install Ctrl+C handler: {}", e);
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
                error!("❌ Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
