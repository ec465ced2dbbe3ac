mod bootstrap;
mod health;

use anyhow::Result;
use ticketdesk_core::config::{AppConfig, LoadOptions};
use ticketdesk_store::TicketRepository;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use ticketdesk_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;

    health::spawn(&app.config.server.bind_address, app.config.server.port).await?;

    tracing::info!(
        event_name = "system.server.gateway_transport_mode",
        transport_mode = app.runner.transport_name(),
        correlation_id = "bootstrap",
        "gateway runner transport initialized"
    );

    let runner = app.runner;
    let gateway_task = tokio::spawn(async move { runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        services = app.config.services.len(),
        "ticketdesk-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        tickets_tracked = app.store.len().await.unwrap_or_default(),
        "ticketdesk-server stopping"
    );
    gateway_task.abort();

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
