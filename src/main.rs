use anyhow::Context;
use konnect_payments::api::{self, health::HealthState};
use konnect_payments::config::AppConfig;
use konnect_payments::database::{self, PgHost, PoolConfig};
use konnect_payments::konnect::KonnectPlugin;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.server.log_format);

    tracing::info!("Starting Konnect gateway");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Konnect API: {}", config.konnect.base_url);

    let pool = database::init_pool(
        &config.database.url,
        Some(PoolConfig::with_max_connections(config.database.max_connections)),
    )
    .await
    .context("failed to connect to the database")?;
    database::run_migrations(&pool).await?;

    let host = PgHost::new(pool.clone()).with_handler(KonnectPlugin::payment_handler());
    let plugin = KonnectPlugin::init(config.konnect.clone(), Arc::new(host))?;

    let health = HealthState {
        environment: config.server.environment.clone(),
        konnect_base_url: config.konnect.base_url.clone(),
        pool: Some(pool),
    };
    let app = api::router(&plugin, health);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if log_format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
