use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use ticketdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use ticketdesk_discord::{
    Gateway, GatewayError, GatewayRunner, GatewayTransport, InteractionRouter, ReconnectPolicy,
    RestGateway, TicketController, TicketSettings, WebSocketTransport,
};
use ticketdesk_store::InMemoryTicketRepository;

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<InMemoryTicketRepository>,
    pub runner: GatewayRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("discord gateway setup failed: {0}")]
    Gateway(#[from] GatewayError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let gateway = Arc::new(RestGateway::new(&config.discord)?);
    let transport = Arc::new(WebSocketTransport::new(&config.discord));
    info!(
        event_name = "system.bootstrap.gateway_ready",
        correlation_id = "bootstrap",
        api_base_url = %config.discord.api_base_url,
        gateway_url = %config.discord.gateway_url,
        "discord rest gateway and websocket transport configured"
    );
    Ok(assemble(config, gateway, transport))
}

/// Wires store, controller, router and runner around the given platform adapters.
pub fn assemble(
    config: AppConfig,
    gateway: Arc<dyn Gateway>,
    transport: Arc<dyn GatewayTransport>,
) -> Application {
    let store = Arc::new(InMemoryTicketRepository::default());
    let controller = Arc::new(TicketController::new(
        gateway.clone(),
        store.clone(),
        config.catalog(),
        TicketSettings::from_config(&config),
    ));
    let router = Arc::new(InteractionRouter::new(gateway, controller, config.panel.clone()));
    let runner = GatewayRunner::new(transport, router, ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.assembled",
        correlation_id = "bootstrap",
        services = config.services.len(),
        delete_delay_secs = config.tickets.delete_delay_secs,
        transport = runner.transport_name(),
        "ticket desk assembled"
    );

    Application { config, store, runner }
}
