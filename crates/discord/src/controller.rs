use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ticketdesk_core::config::AppConfig;
use ticketdesk_core::domain::service::{ServiceDescriptor, ServiceId};
use ticketdesk_core::domain::ticket::{ChannelId, GuildId, RoleId, Ticket};
use ticketdesk_core::{
    DomainError, LifecycleError, Member, Permissions, ServiceCatalog, TicketAction, TicketContext,
    TicketEvent, TicketLifecycle, TransitionOutcome,
};
use ticketdesk_store::{RepositoryError, TicketRepository};

use crate::components::{ticket_welcome, OutgoingMessage};
use crate::gateway::{
    Channel, CreateChannel, Gateway, GatewayError, InteractionResponse, OverwriteTarget,
    PermissionOverwrite, Responder,
};

pub const CATEGORY_MISSING_NOTICE: &str =
    "Ticket category not found! Please contact an administrator.";
pub const STAFF_ROLE_MISSING_NOTICE: &str =
    "Staff role not found! Please contact an administrator.";
pub const DELETE_DENIED_NOTICE: &str = "You don't have permission to delete this ticket.";
pub const TICKET_CLOSED_NOTICE: &str = "This ticket is already closed.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketSettings {
    pub guild_id: GuildId,
    pub category_id: ChannelId,
    pub staff_role_id: RoleId,
    pub delete_delay: Duration,
}

impl TicketSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            guild_id: GuildId(config.discord.guild_id.clone()),
            category_id: ChannelId(config.discord.ticket_category_id.clone()),
            staff_role_id: RoleId(config.discord.staff_role_id.clone()),
            delete_delay: Duration::from_secs(config.tickets.delete_delay_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<LifecycleError> for ControllerError {
    fn from(error: LifecycleError) -> Self {
        Self::Domain(DomainError::from(error))
    }
}

#[derive(Debug)]
pub enum OpenOutcome {
    Opened { ticket: Ticket, channel: Channel },
    /// Guild setup is incomplete; the member was told and nothing was created.
    Misconfigured(LifecycleError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifyResult {
    Direct,
    ChannelFallback,
    Failed(GatewayError),
}

#[derive(Debug)]
pub enum ClaimOutcome {
    Claimed { ticket: Ticket, notify: NotifyResult },
    AlreadyClosed,
}

#[derive(Debug)]
pub enum DeleteOutcome {
    /// Channel removal is pending; the handle resolves once it ran.
    Scheduled(JoinHandle<()>),
    Denied,
    AlreadyClosed,
}

/// Drives tickets through [`TicketLifecycle`] and performs the side effects
/// each transition asks for, in order.
pub struct TicketController {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn TicketRepository>,
    catalog: ServiceCatalog,
    settings: TicketSettings,
    lifecycle: TicketLifecycle,
}

impl TicketController {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn TicketRepository>,
        catalog: ServiceCatalog,
        settings: TicketSettings,
    ) -> Self {
        Self { gateway, store, catalog, settings, lifecycle: TicketLifecycle }
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &TicketSettings {
        &self.settings
    }

    pub async fn open_ticket(
        &self,
        responder: &Responder<'_>,
        service_id: &ServiceId,
    ) -> Result<OpenOutcome, ControllerError> {
        let service = self
            .catalog
            .get(service_id)
            .ok_or_else(|| DomainError::UnknownService(service_id.0.clone()))?;

        let context = TicketContext {
            category_available: self.gateway.get_channel(&self.settings.category_id).await?.is_some(),
            staff_role_available: self
                .gateway
                .get_role(&self.settings.guild_id, &self.settings.staff_role_id)
                .await?
                .is_some(),
            ..TicketContext::default()
        };

        let outcome = match self.lifecycle.apply(None, &TicketEvent::ServiceSelected, &context) {
            Ok(outcome) => outcome,
            Err(error @ LifecycleError::CategoryUnavailable) => {
                warn!(
                    event_name = "ticket.open.misconfigured",
                    category_id = %self.settings.category_id,
                    "ticket category is missing"
                );
                responder.ephemeral(CATEGORY_MISSING_NOTICE).await?;
                return Ok(OpenOutcome::Misconfigured(error));
            }
            Err(error @ LifecycleError::StaffRoleUnavailable) => {
                warn!(
                    event_name = "ticket.open.misconfigured",
                    staff_role_id = %self.settings.staff_role_id.0,
                    "staff role is missing"
                );
                responder.ephemeral(STAFF_ROLE_MISSING_NOTICE).await?;
                return Ok(OpenOutcome::Misconfigured(error));
            }
            Err(error) => return Err(error.into()),
        };

        let mut channel: Option<Channel> = None;
        let mut ticket: Option<Ticket> = None;
        let performed = self
            .perform_open(&outcome, responder, service, &mut channel, &mut ticket)
            .await;
        if let Err(open_error) = performed {
            match (&channel, &ticket) {
                (Some(orphan), None) => self.discard_orphan(orphan, &open_error).await,
                (Some(created), Some(_)) => warn!(
                    event_name = "ticket.open.incomplete",
                    channel_id = %created.id,
                    error = %open_error,
                    "ticket is tracked but its channel setup did not finish"
                ),
                _ => {}
            }
            return Err(open_error);
        }

        let (Some(ticket), Some(channel)) = (ticket, channel) else {
            return Err(DomainError::InvariantViolation(
                "ticket opened without a channel record".to_owned(),
            )
            .into());
        };

        info!(
            event_name = "ticket.opened",
            channel_id = %ticket.channel_id,
            owner_id = %ticket.owner_id,
            service_id = %ticket.service_id,
            "ticket opened"
        );
        Ok(OpenOutcome::Opened { ticket, channel })
    }

    pub async fn claim_ticket(
        &self,
        responder: &Responder<'_>,
        channel_id: &ChannelId,
    ) -> Result<ClaimOutcome, ControllerError> {
        let staff = &responder.interaction().member;
        let current = self.store.get(channel_id).await?;
        let state = current.as_ref().map(|ticket| ticket.status);

        let outcome =
            match self.lifecycle.apply(state, &TicketEvent::ClaimPressed, &TicketContext::default()) {
                Ok(outcome) => outcome,
                Err(LifecycleError::Closed { .. }) => {
                    responder.ephemeral(TICKET_CLOSED_NOTICE).await?;
                    return Ok(ClaimOutcome::AlreadyClosed);
                }
                Err(error) => return Err(error.into()),
            };

        let mut ticket = current;
        let mut notify = NotifyResult::Direct;
        for action in &outcome.actions {
            match action {
                TicketAction::RecordClaim => {
                    ticket = Some(self.store.set_claimed(channel_id, &staff.user_id).await?);
                }
                TicketAction::NotifyOwner => {
                    let claimed = ticket.as_ref().ok_or_else(|| {
                        DomainError::InvariantViolation("claim without a ticket record".to_owned())
                    })?;
                    notify = self.notify_owner(claimed, staff).await?;
                }
                TicketAction::AnnounceClaim => {
                    let announcement = format!(
                        "Ticket claimed by {}. They are ready to provide the service.",
                        staff.user_id.mention()
                    );
                    self.gateway
                        .send_message(channel_id, OutgoingMessage::text(announcement))
                        .await?;
                }
                TicketAction::DeferAcknowledgement => {
                    responder.respond(InteractionResponse::DeferredUpdate).await?;
                }
                other => return Err(unexpected_action(&outcome, other)),
            }
        }

        let ticket = ticket.ok_or_else(|| {
            DomainError::InvariantViolation("claim without a ticket record".to_owned())
        })?;
        info!(
            event_name = "ticket.claimed",
            channel_id = %channel_id,
            staff_id = %staff.user_id,
            notify = ?notify,
            "ticket claimed"
        );
        Ok(ClaimOutcome::Claimed { ticket, notify })
    }

    pub async fn delete_ticket(
        &self,
        responder: &Responder<'_>,
        channel_id: &ChannelId,
    ) -> Result<DeleteOutcome, ControllerError> {
        let actor = &responder.interaction().member;
        let state = self.store.get(channel_id).await?.map(|ticket| ticket.status);
        let context = TicketContext {
            actor_can_manage_channels: self
                .gateway
                .member_has_permission(actor, Permissions::MANAGE_CHANNELS),
            actor_is_staff: actor.has_role(&self.settings.staff_role_id),
            ..TicketContext::default()
        };

        let outcome = match self.lifecycle.apply(state, &TicketEvent::DeletePressed, &context) {
            Ok(outcome) => outcome,
            Err(LifecycleError::Closed { .. }) => {
                responder.ephemeral(TICKET_CLOSED_NOTICE).await?;
                return Ok(DeleteOutcome::AlreadyClosed);
            }
            Err(error) => return Err(error.into()),
        };

        let mut scheduled = None;
        for action in &outcome.actions {
            match action {
                TicketAction::DenyPermission => {
                    info!(
                        event_name = "ticket.delete.denied",
                        channel_id = %channel_id,
                        actor_id = %actor.user_id,
                        "delete refused"
                    );
                    responder.ephemeral(DELETE_DENIED_NOTICE).await?;
                    return Ok(DeleteOutcome::Denied);
                }
                TicketAction::AnnounceCountdown => {
                    responder
                        .ephemeral(format!(
                            "Deleting this ticket in {} seconds...",
                            self.settings.delete_delay.as_secs()
                        ))
                        .await?;
                }
                TicketAction::MarkDeleted => {
                    self.store.set_deleted(channel_id).await?;
                }
                TicketAction::ScheduleChannelDeletion => {
                    scheduled = Some(self.schedule_deletion(channel_id.clone()));
                }
                other => return Err(unexpected_action(&outcome, other)),
            }
        }

        let handle = scheduled.ok_or_else(|| {
            DomainError::InvariantViolation("delete transition scheduled nothing".to_owned())
        })?;
        info!(
            event_name = "ticket.deleted",
            channel_id = %channel_id,
            actor_id = %actor.user_id,
            tracked = state.is_some(),
            delay_secs = self.settings.delete_delay.as_secs(),
            "ticket marked deleted"
        );
        Ok(DeleteOutcome::Scheduled(handle))
    }

    async fn perform_open(
        &self,
        outcome: &TransitionOutcome,
        responder: &Responder<'_>,
        service: &ServiceDescriptor,
        channel: &mut Option<Channel>,
        ticket: &mut Option<Ticket>,
    ) -> Result<(), ControllerError> {
        let owner = &responder.interaction().member;
        for action in &outcome.actions {
            match action {
                TicketAction::CreateChannel => {
                    let request = self.channel_request(owner, &service.id, &service.display_name);
                    *channel = Some(self.gateway.create_channel(request).await?);
                }
                TicketAction::StoreTicket => {
                    let created = created_channel(channel)?;
                    let record =
                        Ticket::open(created.id.clone(), owner.user_id.clone(), service.id.clone());
                    self.store.put(record.clone()).await?;
                    *ticket = Some(record);
                }
                TicketAction::ConfirmCreation => {
                    let created = created_channel(channel)?;
                    responder
                        .ephemeral(format!("Ticket created! Check {}", created.id.mention()))
                        .await?;
                }
                TicketAction::PostControls => {
                    let created = created_channel(channel)?;
                    self.gateway
                        .send_message(&created.id, ticket_welcome(&created.id, service, &owner.user_id))
                        .await?;
                }
                other => return Err(unexpected_action(outcome, other)),
            }
        }
        Ok(())
    }

    /// Removes a channel that was created for a ticket which never got recorded.
    async fn discard_orphan(&self, orphan: &Channel, cause: &ControllerError) {
        match self.gateway.delete_channel(&orphan.id).await {
            Ok(()) => warn!(
                event_name = "ticket.open.rolled_back",
                channel_id = %orphan.id,
                error = %cause,
                "ticket was not recorded; channel removed"
            ),
            Err(delete_error) => error!(
                event_name = "ticket.open.orphaned",
                channel_id = %orphan.id,
                error = %cause,
                delete_error = %delete_error,
                "ticket was not recorded and its channel could not be removed"
            ),
        }
    }

    fn channel_request(
        &self,
        owner: &Member,
        service_id: &ServiceId,
        service_name: &str,
    ) -> CreateChannel {
        let read_write = Permissions::VIEW_CHANNEL.union(Permissions::SEND_MESSAGES);
        CreateChannel {
            guild_id: self.settings.guild_id.clone(),
            name: ticket_channel_name(&owner.username, service_id),
            category_id: self.settings.category_id.clone(),
            topic: format!("Ticket for {} - Service: {service_name}", owner.username),
            overwrites: vec![
                // The @everyone role shares the guild's id.
                PermissionOverwrite::deny(
                    OverwriteTarget::Role(RoleId(self.settings.guild_id.0.clone())),
                    Permissions::VIEW_CHANNEL,
                ),
                PermissionOverwrite::allow(OverwriteTarget::Member(owner.user_id.clone()), read_write),
                PermissionOverwrite::allow(
                    OverwriteTarget::Role(self.settings.staff_role_id.clone()),
                    read_write,
                ),
            ],
        }
    }

    async fn notify_owner(
        &self,
        ticket: &Ticket,
        staff: &Member,
    ) -> Result<NotifyResult, ControllerError> {
        let service_name = self
            .catalog
            .get(&ticket.service_id)
            .map(|service| service.display_name.as_str())
            .unwrap_or(ticket.service_id.0.as_str());
        let direct = format!(
            "Your ticket for {service_name} has been claimed by {}. They are ready to provide the service.",
            staff.username
        );

        match self.gateway.send_direct(&ticket.owner_id, &direct).await {
            Ok(()) => Ok(NotifyResult::Direct),
            Err(GatewayError::DeliveryForbidden) => {
                let fallback = format!(
                    "{}, your ticket has been claimed by {}. They are ready to provide the service.",
                    ticket.owner_id.mention(),
                    staff.user_id.mention()
                );
                self.gateway
                    .send_message(&ticket.channel_id, OutgoingMessage::text(fallback))
                    .await?;
                Ok(NotifyResult::ChannelFallback)
            }
            Err(other) => {
                warn!(
                    event_name = "ticket.claim.notify_failed",
                    channel_id = %ticket.channel_id,
                    owner_id = %ticket.owner_id,
                    error = %other,
                    "could not notify ticket owner"
                );
                self.gateway
                    .send_message(
                        &ticket.channel_id,
                        OutgoingMessage::text(format!("Could not notify the ticket creator: {other}")),
                    )
                    .await?;
                Ok(NotifyResult::Failed(other))
            }
        }
    }

    fn schedule_deletion(&self, channel_id: ChannelId) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let delay = self.settings.delete_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match gateway.delete_channel(&channel_id).await {
                Ok(()) => info!(
                    event_name = "ticket.channel.deleted",
                    channel_id = %channel_id,
                    "ticket channel removed"
                ),
                Err(delete_error) => error!(
                    event_name = "ticket.channel.delete_failed",
                    channel_id = %channel_id,
                    error = %delete_error,
                    "ticket channel removal failed"
                ),
            }
        })
    }
}

/// `ticket-{username}-{service}`, lowercased with whitespace runs collapsed to `-`.
pub fn ticket_channel_name(username: &str, service_id: &ServiceId) -> String {
    format!("ticket-{username}-{service_id}")
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn created_channel(channel: &Option<Channel>) -> Result<&Channel, ControllerError> {
    channel.as_ref().ok_or_else(|| {
        DomainError::InvariantViolation("ticket channel was not created yet".to_owned()).into()
    })
}

fn unexpected_action(outcome: &TransitionOutcome, action: &TicketAction) -> ControllerError {
    DomainError::InvariantViolation(format!(
        "action {action:?} does not belong to {:?} transition",
        outcome.event
    ))
    .into()
}
