use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use ticketdesk_core::config::DiscordConfig;
use ticketdesk_core::domain::ticket::{ChannelId, GuildId, RoleId, UserId};
use ticketdesk_core::Permissions;

use crate::components::OutgoingMessage;
use crate::gateway::{
    Channel, CreateChannel, Gateway, GatewayError, InteractionResponse, MessageId, OverwriteTarget,
    Role,
};
use crate::interactions::Interaction;

const GUILD_TEXT_CHANNEL: u8 = 0;
const OVERWRITE_ROLE: u8 = 0;
const OVERWRITE_MEMBER: u8 = 1;
const CALLBACK_CHANNEL_MESSAGE: u8 = 4;
const CALLBACK_DEFERRED_UPDATE: u8 = 6;
const FLAG_EPHEMERAL: u64 = 1 << 6;
const CANNOT_MESSAGE_USER: u64 = 50007;

/// [`Gateway`] over the platform's HTTP API.
pub struct RestGateway {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl RestGateway {
    pub fn new(config: &DiscordConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|error| GatewayError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token: config.bot_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bot {}", self.token.expose_secret()))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Option<Value>, GatewayError> {
        let response =
            request.send().await.map_err(|error| GatewayError::Transport(error.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|error| GatewayError::Transport(error.to_string()))?;

        if status.is_success() {
            if body.trim().is_empty() {
                return Ok(None);
            }
            return serde_json::from_str(&body)
                .map(Some)
                .map_err(|error| GatewayError::Decode(error.to_string()));
        }

        debug!(status = status.as_u16(), body = %body, "platform request failed");
        Err(classify_failure(status, &body))
    }

    async fn send_json<T>(&self, request: RequestBuilder) -> Result<T, GatewayError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let value = self
            .send(request)
            .await?
            .ok_or_else(|| GatewayError::Decode("empty response body".to_owned()))?;
        serde_json::from_value(value).map_err(|error| GatewayError::Decode(error.to_string()))
    }
}

#[async_trait]
impl Gateway for RestGateway {
    async fn create_channel(&self, request: CreateChannel) -> Result<Channel, GatewayError> {
        let path = format!("/guilds/{}/channels", request.guild_id.0);
        let raw: RawChannel =
            self.send_json(self.request(Method::POST, &path).json(&channel_payload(&request))).await?;
        Ok(raw.into())
    }

    async fn send_message(
        &self,
        channel_id: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageId, GatewayError> {
        let path = format!("/channels/{}/messages", channel_id.0);
        let raw: RawMessage = self.send_json(self.request(Method::POST, &path).json(&message)).await?;
        Ok(MessageId(raw.id))
    }

    async fn send_direct(&self, user_id: &UserId, content: &str) -> Result<(), GatewayError> {
        let dm: RawChannel = self
            .send_json(
                self.request(Method::POST, "/users/@me/channels")
                    .json(&json!({ "recipient_id": user_id.0 })),
            )
            .await?;
        self.send_message(&ChannelId(dm.id), OutgoingMessage::text(content)).await?;
        Ok(())
    }

    async fn delete_channel(&self, channel_id: &ChannelId) -> Result<(), GatewayError> {
        let path = format!("/channels/{}", channel_id.0);
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Option<Channel>, GatewayError> {
        let path = format!("/channels/{}", channel_id.0);
        match self.send_json::<RawChannel>(self.request(Method::GET, &path)).await {
            Ok(raw) => Ok(Some(raw.into())),
            Err(GatewayError::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn get_role(
        &self,
        guild_id: &GuildId,
        role_id: &RoleId,
    ) -> Result<Option<Role>, GatewayError> {
        let path = format!("/guilds/{}/roles", guild_id.0);
        let roles: Vec<RawRole> = match self.send_json(self.request(Method::GET, &path)).await {
            Ok(roles) => roles,
            Err(GatewayError::NotFound(_)) => return Ok(None),
            Err(error) => return Err(error),
        };
        Ok(roles
            .into_iter()
            .find(|role| role.id == role_id.0)
            .map(|role| Role { id: RoleId(role.id), name: role.name }))
    }

    async fn bot_permissions(&self, guild_id: &GuildId) -> Result<Permissions, GatewayError> {
        let me: RawUser = self.send_json(self.request(Method::GET, "/users/@me")).await?;
        let member: RawGuildMember = self
            .send_json(
                self.request(Method::GET, &format!("/guilds/{}/members/{}", guild_id.0, me.id)),
            )
            .await?;
        let roles: Vec<RawRole> = self
            .send_json(self.request(Method::GET, &format!("/guilds/{}/roles", guild_id.0)))
            .await?;
        Ok(guild_permissions(guild_id, &member.roles, &roles))
    }

    async fn respond(
        &self,
        interaction: &Interaction,
        response: InteractionResponse,
    ) -> Result<(), GatewayError> {
        let path = format!("/interactions/{}/{}/callback", interaction.id, interaction.token);
        self.send(self.request(Method::POST, &path).json(&interaction_callback_payload(&response)))
            .await?;
        Ok(())
    }
}

pub fn channel_payload(request: &CreateChannel) -> Value {
    let overwrites: Vec<Value> = request
        .overwrites
        .iter()
        .map(|overwrite| {
            let (id, kind) = match &overwrite.target {
                OverwriteTarget::Role(role) => (role.0.as_str(), OVERWRITE_ROLE),
                OverwriteTarget::Member(user) => (user.0.as_str(), OVERWRITE_MEMBER),
            };
            json!({
                "id": id,
                "type": kind,
                "allow": overwrite.allow.0.to_string(),
                "deny": overwrite.deny.0.to_string(),
            })
        })
        .collect();

    json!({
        "name": request.name,
        "type": GUILD_TEXT_CHANNEL,
        "parent_id": request.category_id.0,
        "topic": request.topic,
        "permission_overwrites": overwrites,
    })
}

pub fn interaction_callback_payload(response: &InteractionResponse) -> Value {
    match response {
        InteractionResponse::Ephemeral(message) => {
            let mut data = json!(message);
            data["flags"] = json!(FLAG_EPHEMERAL);
            json!({ "type": CALLBACK_CHANNEL_MESSAGE, "data": data })
        }
        InteractionResponse::DeferredUpdate => json!({ "type": CALLBACK_DEFERRED_UPDATE }),
    }
}

/// Union of the `@everyone` role (which shares the guild's id) and the
/// member's roles. Role permission fields that fail to parse count as empty.
fn guild_permissions(guild_id: &GuildId, member_roles: &[String], roles: &[RawRole]) -> Permissions {
    roles
        .iter()
        .filter(|role| role.id == guild_id.0 || member_roles.contains(&role.id))
        .filter_map(|role| Permissions::parse(&role.permissions))
        .fold(Permissions::empty(), Permissions::union)
}

/// Maps a non-success response onto [`GatewayError`].
pub fn classify_failure(status: StatusCode, body: &str) -> GatewayError {
    let parsed: Option<RawApiError> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map(|error| error.message.clone())
        .unwrap_or_else(|| body.trim().to_owned());

    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::FORBIDDEN
            if parsed.as_ref().and_then(|error| error.code) == Some(CANNOT_MESSAGE_USER) =>
        {
            GatewayError::DeliveryForbidden
        }
        status => GatewayError::Rejected { status: status.as_u16(), message },
    }
}

#[derive(Debug, Deserialize)]
struct RawApiError {
    #[serde(default)]
    message: String,
    code: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    parent_id: Option<String>,
}

impl From<RawChannel> for Channel {
    fn from(raw: RawChannel) -> Self {
        Self {
            id: ChannelId(raw.id),
            name: raw.name.unwrap_or_default(),
            parent_id: raw.parent_id.map(ChannelId),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawRole {
    id: String,
    name: String,
    #[serde(default)]
    permissions: String,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawGuildMember {
    #[serde(default)]
    roles: Vec<String>,
}
