use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ticketdesk_core::domain::ticket::{ChannelId, GuildId, RoleId, UserId};
use ticketdesk_core::{Member, Permissions, ServiceCatalog};
use ticketdesk_store::InMemoryTicketRepository;

use crate::components::OutgoingMessage;
use crate::controller::{TicketController, TicketSettings};
use crate::gateway::{
    Channel, CreateChannel, Gateway, GatewayError, InteractionResponse, MessageId, Role,
};
use crate::interactions::{Interaction, InteractionData};

pub const GUILD: &str = "G-1";
pub const CATEGORY: &str = "C-category";
pub const STAFF_ROLE: &str = "R-staff";
pub const ORIGIN_CHANNEL: &str = "C-origin";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayCall {
    CreateChannel(CreateChannel),
    SendMessage { channel_id: ChannelId, message: OutgoingMessage },
    SendDirect { user_id: UserId, content: String },
    DeleteChannel(ChannelId),
    Respond { interaction_id: String, response: InteractionResponse },
}

#[derive(Default)]
struct GatewayState {
    channels: HashMap<String, Channel>,
    roles: HashMap<String, Role>,
    bot_permissions: Permissions,
    permission_lookups: Vec<GuildId>,
    direct_failure: Option<GatewayError>,
    send_failure: Option<GatewayError>,
    next_id: u64,
    calls: Vec<GatewayCall>,
}

/// In-process [`Gateway`] that records every call.
#[derive(Default)]
pub struct RecordingGateway {
    state: Mutex<GatewayState>,
}

impl RecordingGateway {
    /// A guild with the ticket category and the staff role present.
    pub fn with_guild() -> Self {
        Self::default()
            .with_channel(CATEGORY, "Tickets")
            .with_role(STAFF_ROLE, "Staff")
    }

    pub fn with_channel(self, id: &str, name: &str) -> Self {
        self.lock().channels.insert(
            id.to_owned(),
            Channel { id: ChannelId(id.to_owned()), name: name.to_owned(), parent_id: None },
        );
        self
    }

    pub fn with_role(self, id: &str, name: &str) -> Self {
        self.lock()
            .roles
            .insert(id.to_owned(), Role { id: RoleId(id.to_owned()), name: name.to_owned() });
        self
    }

    pub fn with_bot_permissions(self, permissions: Permissions) -> Self {
        self.lock().bot_permissions = permissions;
        self
    }

    pub fn failing_direct_messages(self, error: GatewayError) -> Self {
        self.lock().direct_failure = Some(error);
        self
    }

    pub fn failing_messages(self, error: GatewayError) -> Self {
        self.lock().send_failure = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn responses(&self) -> Vec<InteractionResponse> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Respond { response, .. } => Some(response),
                _ => None,
            })
            .collect()
    }

    pub fn messages_in(&self, channel_id: &str) -> Vec<OutgoingMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::SendMessage { channel_id: id, message } if id.0 == channel_id => {
                    Some(message)
                }
                _ => None,
            })
            .collect()
    }

    /// Guilds whose bot permissions were requested, in order.
    pub fn permission_lookups(&self) -> Vec<GuildId> {
        self.lock().permission_lookups.clone()
    }

    pub fn channel_exists(&self, channel_id: &str) -> bool {
        self.lock().channels.contains_key(channel_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GatewayState> {
        self.state.lock().expect("gateway state lock")
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    async fn create_channel(&self, request: CreateChannel) -> Result<Channel, GatewayError> {
        let mut state = self.lock();
        state.next_id += 1;
        let channel = Channel {
            id: ChannelId(format!("C-ticket-{}", state.next_id)),
            name: request.name.clone(),
            parent_id: Some(request.category_id.clone()),
        };
        state.channels.insert(channel.id.0.clone(), channel.clone());
        state.calls.push(GatewayCall::CreateChannel(request));
        Ok(channel)
    }

    async fn send_message(
        &self,
        channel_id: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, GatewayError> {
        let mut state = self.lock();
        if let Some(error) = state.send_failure.clone() {
            return Err(error);
        }
        state.next_id += 1;
        let id = MessageId(format!("M-{}", state.next_id));
        state.calls.push(GatewayCall::SendMessage { channel_id: channel_id.clone(), message });
        Ok(id)
    }

    async fn send_direct(&self, user_id: &UserId, content: &str) -> Result<(), GatewayError> {
        let mut state = self.lock();
        if let Some(error) = state.direct_failure.clone() {
            return Err(error);
        }
        state
            .calls
            .push(GatewayCall::SendDirect { user_id: user_id.clone(), content: content.to_owned() });
        Ok(())
    }

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<(), GatewayError> {
        let mut state = self.lock();
        state.channels.remove(&channel_id.0);
        state.calls.push(GatewayCall::DeleteChannel(channel_id.clone()));
        Ok(())
    }

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Option<Channel>, GatewayError> {
        Ok(self.lock().channels.get(&channel_id.0).cloned())
    }

    async fn get_role(
        &self,
        _guild_id: &GuildId,
        role_id: &RoleId,
    ) -> Result<Option<Role>, GatewayError> {
        Ok(self.lock().roles.get(&role_id.0).cloned())
    }

    async fn bot_permissions(&self, guild_id: &GuildId) -> Result<Permissions, GatewayError> {
        let mut state = self.lock();
        state.permission_lookups.push(guild_id.clone());
        Ok(state.bot_permissions)
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> Result<(), GatewayError> {
        self.lock()
            .calls
            .push(GatewayCall::Respond { interaction_id: interaction.id.clone(), response });
        Ok(())
    }
}

pub fn member(id: &str, username: &str) -> Member {
    Member {
        user_id: UserId(id.to_owned()),
        username: username.to_owned(),
        roles: Vec::new(),
        permissions: Permissions::empty(),
    }
}

pub fn staff(id: &str, username: &str) -> Member {
    let mut member = member(id, username);
    member.roles.push(RoleId(STAFF_ROLE.to_owned()));
    member
}

fn interaction(data: InteractionData, member: Member, channel_id: &str) -> Interaction {
    Interaction {
        id: format!("I-{}-{}", member.user_id.0, channel_id),
        token: "interaction-token".to_owned(),
        guild_id: Some(GuildId(GUILD.to_owned())),
        channel_id: ChannelId(channel_id.to_owned()),
        member,
        data,
    }
}

pub fn sample_interaction(custom_id: &str, member: Member) -> Interaction {
    component_in(ORIGIN_CHANNEL, custom_id, &[], member)
}

pub fn component_in(channel_id: &str, custom_id: &str, values: &[&str], member: Member) -> Interaction {
    interaction(
        InteractionData::Component {
            custom_id: custom_id.to_owned(),
            values: values.iter().map(|value| (*value).to_owned()).collect(),
        },
        member,
        channel_id,
    )
}

pub fn command(name: &str, member: Member) -> Interaction {
    interaction(InteractionData::Command { name: name.to_owned() }, member, ORIGIN_CHANNEL)
}

pub fn settings() -> TicketSettings {
    TicketSettings {
        guild_id: GuildId(GUILD.to_owned()),
        category_id: ChannelId(CATEGORY.to_owned()),
        staff_role_id: RoleId(STAFF_ROLE.to_owned()),
        delete_delay: Duration::from_secs(5),
    }
}

pub struct Harness {
    pub gateway: Arc<RecordingGateway>,
    pub store: Arc<InMemoryTicketRepository>,
    pub controller: Arc<TicketController>,
}

pub fn harness(gateway: RecordingGateway) -> Harness {
    let gateway = Arc::new(gateway);
    let store = Arc::new(InMemoryTicketRepository::default());
    let controller = Arc::new(TicketController::new(
        gateway.clone(),
        store.clone(),
        ServiceCatalog::default(),
        settings(),
    ));
    Harness { gateway, store, controller }
}
