use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use enterprise_brain::{config::Config, create_app};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "enterprise_brain=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!(
        environment = %config.environment,
        "Starting Enterprise Brain on {}:{}",
        config.host,
        config.port
    );

    let app = create_app(config.clone()).await?;

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Enterprise Brain running at http://{}:{}", config.host, config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
