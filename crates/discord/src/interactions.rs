use serde::Deserialize;
use thiserror::Error;

use ticketdesk_core::domain::service::ServiceId;
use ticketdesk_core::domain::ticket::{ChannelId, GuildId, RoleId, UserId};
use ticketdesk_core::{Member, Permissions};

use crate::commands::TicketCommand;
use crate::components::{CLAIM_TICKET_ID, DELETE_TICKET_ID, SERVICE_SELECT_ID};

const APPLICATION_COMMAND: u8 = 2;
const MESSAGE_COMPONENT: u8 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interaction {
    pub id: String,
    pub token: String,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub member: Member,
    pub data: InteractionData,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionData {
    Command { name: String },
    Component { custom_id: String, values: Vec<String> },
    Other { interaction_type: u8 },
}

/// Closed set of interactions the router knows how to handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    Command(TicketCommand),
    ServiceSelected { service_id: ServiceId },
    ClaimPressed { channel_id: ChannelId },
    DeletePressed { channel_id: ChannelId },
    Unknown { reason: String },
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match &self.data {
            InteractionData::Command { name } => match TicketCommand::parse(name) {
                Some(command) => InteractionKind::Command(command),
                None => InteractionKind::Unknown { reason: format!("unknown command `{name}`") },
            },
            InteractionData::Component { custom_id, values } => {
                self.classify_component(custom_id, values)
            }
            InteractionData::Other { interaction_type } => InteractionKind::Unknown {
                reason: format!("unsupported interaction type {interaction_type}"),
            },
        }
    }

    fn classify_component(&self, custom_id: &str, values: &[String]) -> InteractionKind {
        let (base, scope) = match custom_id.split_once(':') {
            Some((base, scope)) if !scope.is_empty() => (base, Some(scope)),
            _ => (custom_id, None),
        };
        let target = || scope.map(|id| ChannelId(id.to_owned())).unwrap_or_else(|| self.channel_id.clone());

        match base {
            SERVICE_SELECT_ID => match values.first() {
                Some(value) => InteractionKind::ServiceSelected { service_id: ServiceId(value.clone()) },
                None => InteractionKind::Unknown { reason: "service menu submitted without a value".to_owned() },
            },
            CLAIM_TICKET_ID => InteractionKind::ClaimPressed { channel_id: target() },
            DELETE_TICKET_ID => InteractionKind::DeletePressed { channel_id: target() },
            other => InteractionKind::Unknown { reason: format!("unknown component `{other}`") },
        }
    }
}

#[derive(Debug, Error)]
pub enum InteractionParseError {
    #[error("malformed interaction payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("interaction is missing `{0}`")]
    MissingField(&'static str),
    #[error("interaction `{field}` is not a permission bitfield: `{value}`")]
    InvalidPermissions { field: &'static str, value: String },
}

/// Decodes an interaction payload as delivered by the platform.
pub fn parse_interaction(payload: &str) -> Result<Interaction, InteractionParseError> {
    let raw: RawInteraction = serde_json::from_str(payload)?;
    raw.try_into()
}

impl TryFrom<RawInteraction> for Interaction {
    type Error = InteractionParseError;

    fn try_from(raw: RawInteraction) -> Result<Self, Self::Error> {
        let member = raw.member.ok_or(InteractionParseError::MissingField("member"))?;
        let channel_id = raw.channel_id.ok_or(InteractionParseError::MissingField("channel_id"))?;
        let member_permissions = parse_permissions("member.permissions", member.permissions.as_deref())?;

        let data = match (raw.kind, raw.data) {
            (APPLICATION_COMMAND, Some(data)) => InteractionData::Command {
                name: data.name.ok_or(InteractionParseError::MissingField("data.name"))?,
            },
            (MESSAGE_COMPONENT, Some(data)) => InteractionData::Component {
                custom_id: data.custom_id.ok_or(InteractionParseError::MissingField("data.custom_id"))?,
                values: data.values,
            },
            (interaction_type, _) => InteractionData::Other { interaction_type },
        };

        Ok(Self {
            id: raw.id,
            token: raw.token,
            guild_id: raw.guild_id.map(GuildId),
            channel_id: ChannelId(channel_id),
            member: Member {
                user_id: UserId(member.user.id),
                username: member.user.username,
                roles: member.roles.into_iter().map(RoleId).collect(),
                permissions: member_permissions,
            },
            data,
        })
    }
}

fn parse_permissions(field: &'static str, raw: Option<&str>) -> Result<Permissions, InteractionParseError> {
    match raw {
        None => Ok(Permissions::empty()),
        Some(value) => Permissions::parse(value)
            .ok_or_else(|| InteractionParseError::InvalidPermissions { field, value: value.to_owned() }),
    }
}

#[derive(Debug, Deserialize)]
pub struct RawInteraction {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    token: String,
    guild_id: Option<String>,
    channel_id: Option<String>,
    member: Option<RawMember>,
    data: Option<RawInteractionData>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    user: RawUser,
    #[serde(default)]
    roles: Vec<String>,
    permissions: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct RawInteractionData {
    name: Option<String>,
    custom_id: Option<String>,
    #[serde(default)]
    values: Vec<String>,
}
