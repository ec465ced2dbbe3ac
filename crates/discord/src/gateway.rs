use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use ticketdesk_core::domain::ticket::{ChannelId, GuildId, RoleId, UserId};
use ticketdesk_core::{Member, Permissions};

use crate::components::OutgoingMessage;
use crate::interactions::Interaction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverwriteTarget {
    Role(RoleId),
    Member(UserId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl PermissionOverwrite {
    pub fn allow(target: OverwriteTarget, allow: Permissions) -> Self {
        Self { target, allow, deny: Permissions::empty() }
    }

    pub fn deny(target: OverwriteTarget, deny: Permissions) -> Self {
        Self { target, allow: Permissions::empty(), deny }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateChannel {
    pub guild_id: GuildId,
    pub name: String,
    pub category_id: ChannelId,
    pub topic: String,
    pub overwrites: Vec<PermissionOverwrite>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub parent_id: Option<ChannelId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionResponse {
    /// Reply visible only to the invoking member.
    Ephemeral(OutgoingMessage),
    /// Acknowledge a component press without sending anything.
    DeferredUpdate,
}

impl InteractionResponse {
    pub fn ephemeral_text(content: impl Into<String>) -> Self {
        Self::Ephemeral(OutgoingMessage::text(content))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("recipient does not accept direct messages")]
    DeliveryForbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("platform rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("could not decode platform response: {0}")]
    Decode(String),
    #[error("interaction {0} was already answered")]
    AlreadyAcknowledged(String),
}

/// Operations the bot needs from the chat platform.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn create_channel(&self, request: CreateChannel) -> Result<Channel, GatewayError>;

    async fn send_message(
        &self,
        channel_id: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, GatewayError>;

    /// Fails with [`GatewayError::DeliveryForbidden`] when the user blocks DMs.
    async fn send_direct(&self, user_id: &UserId, content: &str) -> Result<(), GatewayError>;

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<(), GatewayError>;

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Option<Channel>, GatewayError>;

    async fn get_role(
        &self,
        guild_id: &GuildId,
        role_id: &RoleId,
    ) -> Result<Option<Role>, GatewayError>;

    /// Guild-wide permissions of the bot's own member: `@everyone` plus its roles.
    async fn bot_permissions(&self, guild_id: &GuildId) -> Result<Permissions, GatewayError>;

    fn member_has_permission(&self, member: &Member, permission: Permissions) -> bool {
        member.permissions.allows(permission)
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> Result<(), GatewayError>;
}

/// Answers one interaction at most once.
pub struct Responder<'a> {
    gateway: &'a dyn Gateway,
    interaction: &'a Interaction,
    answered: AtomicBool,
}

impl<'a> Responder<'a> {
    pub fn new(gateway: &'a dyn Gateway, interaction: &'a Interaction) -> Self {
        Self { gateway, interaction, answered: AtomicBool::new(false) }
    }

    pub fn interaction(&self) -> &Interaction {
        self.interaction
    }

    pub fn is_pending(&self) -> bool {
        !self.answered.load(Ordering::SeqCst)
    }

    pub async fn respond(&self, response: InteractionResponse) -> Result<(), GatewayError> {
        if self.answered.swap(true, Ordering::SeqCst) {
            return Err(GatewayError::AlreadyAcknowledged(self.interaction.id.clone()));
        }
        self.gateway.respond(self.interaction, response).await
    }

    pub async fn ephemeral(&self, content: impl Into<String>) -> Result<(), GatewayError> {
        self.respond(InteractionResponse::ephemeral_text(content)).await
    }
}

#[cfg(test)]
mod tests {
    use ticketdesk_core::Permissions;

    use super::{GatewayError, InteractionResponse, Responder};
    use crate::testing::{member, sample_interaction, RecordingGateway};
    use crate::Gateway;

    #[tokio::test]
    async fn responder_answers_exactly_once() {
        let gateway = RecordingGateway::default();
        let interaction = sample_interaction("delete_ticket", member("U-1", "alice"));
        let responder = Responder::new(&gateway, &interaction);

        assert!(responder.is_pending());
        responder.ephemeral("first").await.expect("first answer");
        assert!(!responder.is_pending());

        let error = responder.respond(InteractionResponse::DeferredUpdate).await.expect_err("second");
        assert_eq!(error, GatewayError::AlreadyAcknowledged(interaction.id.clone()));
        assert_eq!(gateway.responses().len(), 1);
    }

    #[test]
    fn administrator_implies_every_permission() {
        let gateway = RecordingGateway::default();
        let mut admin = member("U-1", "root");
        admin.permissions = Permissions::ADMINISTRATOR;
        assert!(gateway.member_has_permission(&admin, Permissions::MANAGE_CHANNELS));

        let plain = member("U-2", "bob");
        assert!(!gateway.member_has_permission(&plain, Permissions::MANAGE_CHANNELS));
    }
}
