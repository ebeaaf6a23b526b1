use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::database::{DatabaseConfig, health_check, init_pool};
use pin_auth::{
    AppState,
    config::AuthConfig,
    database::run_migrations,
    google::GoogleConfig,
    mailer::{SmtpConfig, SmtpMailer},
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let config = AuthConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool).await?;

    let smtp_config = SmtpConfig::from_env()?;
    let mailer = Arc::new(SmtpMailer::new(&smtp_config)?);

    let verifier = GoogleConfig::from_env()?.build_verifier()?;

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::postgres(pool, mailer, verifier, config);

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Authentication service listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down authentication service");
        })
        .await?;

    Ok(())
}
