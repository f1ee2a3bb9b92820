use anyhow::Context;
use ecobaby_service::{LogFormat, ServiceConfig, create_app};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing in the configured format
fn init_tracing(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ecobaby_service=debug,cry_flow=debug,tower_http=debug".into());

    match format {
        LogFormat::Pretty => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env().context("invalid service configuration")?;
    init_tracing(config.log_format);

    let addr = config.socket_addr()?;
    let app = create_app(&config);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(
        urgent_delay_ms = config.urgent_delay.as_millis() as u64,
        detailed_delay_ms = config.detailed_delay.as_millis() as u64,
        "EcoBaby service starting on {}",
        listener.local_addr()?
    );

    axum::serve(listener, app).await?;

    Ok(())
}
