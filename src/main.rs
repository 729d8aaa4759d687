//! Gigboard server - job marketplace connecting agents and contractors

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gigboard::auth::{JwtSessionIssuer, Pbkdf2Verifier};
use gigboard::config::Config;
use gigboard::{routes, store, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gigboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();

    // Database connection
    let pool = store::connect(&config.database_url, config.max_connections).await?;

    // Run migrations
    store::MIGRATOR.run(&pool).await?;

    let state = AppState::new(
        pool,
        Arc::new(Pbkdf2Verifier::new()),
        Arc::new(JwtSessionIssuer::new(&config.jwt_secret, config.token_ttl())),
    );
    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
