use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use ticketdesk_core::config::PanelConfig;

use crate::commands::{CommandRouteError, TicketCommand};
use crate::components::{catalog_panel, ticket_prompt};
use crate::controller::{ControllerError, TicketController};
use crate::gateway::{Gateway, GatewayError, InteractionResponse, Responder};
use crate::interactions::{Interaction, InteractionKind};

pub const COMMAND_DENIED_NOTICE: &str = "You don't have permission to use this command!";
pub const SETUP_NOTICE: &str = "Setting up ticket system...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    Handled,
    /// The invoker lacked the command's permissions and was told so.
    Denied,
    Ignored,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Command(#[from] CommandRouteError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Single entry point for every interaction the gateway delivers.
pub struct InteractionRouter {
    gateway: Arc<dyn Gateway>,
    controller: Arc<TicketController>,
    panel: PanelConfig,
}

impl InteractionRouter {
    pub fn new(gateway: Arc<dyn Gateway>, controller: Arc<TicketController>, panel: PanelConfig) -> Self {
        Self { gateway, controller, panel }
    }

    pub async fn route(&self, interaction: &Interaction) -> Result<RouteOutcome, RouteError> {
        let kind = interaction.kind();
        if let InteractionKind::Unknown { reason } = &kind {
            debug!(
                event_name = "ingress.interaction.ignored",
                interaction_id = %interaction.id,
                reason = %reason,
                "ignoring interaction"
            );
            return Ok(RouteOutcome::Ignored);
        }

        info!(
            event_name = "ingress.interaction.routed",
            interaction_id = %interaction.id,
            correlation_id = %interaction.id,
            channel_id = %interaction.channel_id,
            actor_id = %interaction.member.user_id,
            kind = ?kind,
            "routing interaction"
        );

        let responder = Responder::new(self.gateway.as_ref(), interaction);
        match self.dispatch(&responder, kind).await {
            Ok(()) => Ok(RouteOutcome::Handled),
            Err(RouteError::Command(denied)) => {
                info!(
                    event_name = "ingress.command.denied",
                    interaction_id = %interaction.id,
                    actor_id = %interaction.member.user_id,
                    error = %denied,
                    "command refused"
                );
                responder.ephemeral(COMMAND_DENIED_NOTICE).await?;
                Ok(RouteOutcome::Denied)
            }
            Err(error) => {
                if responder.is_pending() {
                    if let Err(reply_error) =
                        responder.ephemeral(format!("An error occurred: {error}")).await
                    {
                        warn!(
                            event_name = "ingress.interaction.reply_failed",
                            interaction_id = %interaction.id,
                            error = %reply_error,
                            "could not report failure to invoker"
                        );
                    }
                }
                Err(error)
            }
        }
    }

    async fn dispatch(&self, responder: &Responder<'_>, kind: InteractionKind) -> Result<(), RouteError> {
        let interaction = responder.interaction();
        match kind {
            InteractionKind::Command(command) => {
                command.authorize(interaction.member.permissions)?;
                self.run_command(responder, command).await
            }
            InteractionKind::ServiceSelected { service_id } => {
                self.controller.open_ticket(responder, &service_id).await?;
                Ok(())
            }
            InteractionKind::ClaimPressed { channel_id } => {
                self.controller.claim_ticket(responder, &channel_id).await?;
                Ok(())
            }
            InteractionKind::DeletePressed { channel_id } => {
                self.controller.delete_ticket(responder, &channel_id).await?;
                Ok(())
            }
            InteractionKind::Unknown { .. } => Ok(()),
        }
    }

    async fn run_command(&self, responder: &Responder<'_>, command: TicketCommand) -> Result<(), RouteError> {
        let interaction = responder.interaction();
        match command {
            TicketCommand::SetupTickets => {
                responder.ephemeral(SETUP_NOTICE).await?;
                self.gateway
                    .send_message(
                        &interaction.channel_id,
                        catalog_panel(&self.panel, self.controller.catalog()),
                    )
                    .await?;
            }
            TicketCommand::Ticket => {
                responder
                    .respond(InteractionResponse::Ephemeral(ticket_prompt(
                        &self.panel,
                        self.controller.catalog(),
                    )))
                    .await?;
            }
            TicketCommand::CheckPermissions => {
                let guild_id = interaction
                    .guild_id
                    .clone()
                    .unwrap_or_else(|| self.controller.settings().guild_id.clone());
                let granted = self.gateway.bot_permissions(&guild_id).await?.names().join(", ");
                responder.ephemeral(format!("Bot permissions: {granted}")).await?;
            }
        }
        Ok(())
    }
}
