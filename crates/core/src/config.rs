use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{ServiceCatalog, DEFAULT_SERVICE_ICON};
use crate::domain::service::ServiceDescriptor;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub discord: DiscordConfig,
    pub server: ServerConfig,
    pub tickets: TicketsConfig,
    pub panel: PanelConfig,
    pub services: Vec<ServiceDescriptor>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub guild_id: String,
    pub ticket_category_id: String,
    pub staff_role_id: String,
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub gateway_url: String,
    /// Gateway intents bitfield sent with IDENTIFY.
    pub gateway_intents: u64,
    /// Shown as "Watching <presence>" once the bot is ready.
    pub presence: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct TicketsConfig {
    pub delete_delay_secs: u64,
}

/// Text of the public catalog panel (`/setup_tickets`) and the private
/// prompt (`/ticket`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub title: String,
    pub description: String,
    pub footer: String,
    pub thumbnail_url: Option<String>,
    pub prompt_title: String,
    pub prompt_description: String,
    pub prompt_footer: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub guild_id: Option<String>,
    pub ticket_category_id: Option<String>,
    pub staff_role_id: Option<String>,
    pub port: Option<u16>,
    pub delete_delay_secs: Option<u64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            discord: DiscordConfig {
                bot_token: String::new().into(),
                guild_id: String::new(),
                ticket_category_id: String::new(),
                staff_role_id: String::new(),
                api_base_url: "https://discord.com/api/v10".to_string(),
                request_timeout_secs: 15,
                gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
                gateway_intents: DEFAULT_GATEWAY_INTENTS,
                presence: "for tickets".to_string(),
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 8080 },
            tickets: TicketsConfig { delete_delay_secs: 5 },
            panel: PanelConfig::default(),
            services: ServiceCatalog::default().list().to_vec(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            title: "Buy QLF Stock".to_string(),
            description:
                "Buy QLF Stock - Scripts.\nClick the button and choose which Script your ticket concerns."
                    .to_string(),
            footer: "Powered by QLF Stock".to_string(),
            thumbnail_url: Some(
                "https://i.ibb.co/k2FYRBCM/New-Project-2025-04-22-T022705-720.jpg".to_string(),
            ),
            prompt_title: "Assistance".to_string(),
            prompt_description:
                "Support - Guildes.\nClique sur le bouton et choisis quelle guilde ton ticket concerne-t-il"
                    .to_string(),
            prompt_footer: "Powered by ticketsbot.cloud".to_string(),
        }
    }
}

/// GUILDS | GUILD_MEMBERS | GUILD_MESSAGES | MESSAGE_CONTENT
pub const DEFAULT_GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 1) | (1 << 9) | (1 << 15);

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ticketdesk.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn catalog(&self) -> ServiceCatalog {
        ServiceCatalog::new(self.services.clone())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(discord) = patch.discord {
            if let Some(bot_token_value) = discord.bot_token {
                self.discord.bot_token = secret_value(bot_token_value);
            }
            if let Some(guild_id) = discord.guild_id {
                self.discord.guild_id = guild_id;
            }
            if let Some(ticket_category_id) = discord.ticket_category_id {
                self.discord.ticket_category_id = ticket_category_id;
            }
            if let Some(staff_role_id) = discord.staff_role_id {
                self.discord.staff_role_id = staff_role_id;
            }
            if let Some(api_base_url) = discord.api_base_url {
                self.discord.api_base_url = api_base_url;
            }
            if let Some(request_timeout_secs) = discord.request_timeout_secs {
                self.discord.request_timeout_secs = request_timeout_secs;
            }
            if let Some(gateway_url) = discord.gateway_url {
                self.discord.gateway_url = gateway_url;
            }
            if let Some(gateway_intents) = discord.gateway_intents {
                self.discord.gateway_intents = gateway_intents;
            }
            if let Some(presence) = discord.presence {
                self.discord.presence = presence;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(tickets) = patch.tickets {
            if let Some(delete_delay_secs) = tickets.delete_delay_secs {
                self.tickets.delete_delay_secs = delete_delay_secs;
            }
        }

        if let Some(panel) = patch.panel {
            if let Some(title) = panel.title {
                self.panel.title = title;
            }
            if let Some(description) = panel.description {
                self.panel.description = description;
            }
            if let Some(footer) = panel.footer {
                self.panel.footer = footer;
            }
            if let Some(thumbnail_url) = panel.thumbnail_url {
                self.panel.thumbnail_url =
                    if thumbnail_url.trim().is_empty() { None } else { Some(thumbnail_url) };
            }
            if let Some(prompt_title) = panel.prompt_title {
                self.panel.prompt_title = prompt_title;
            }
            if let Some(prompt_description) = panel.prompt_description {
                self.panel.prompt_description = prompt_description;
            }
            if let Some(prompt_footer) = panel.prompt_footer {
                self.panel.prompt_footer = prompt_footer;
            }
        }

        if let Some(services) = patch.services {
            self.services = services
                .into_iter()
                .map(|service| {
                    ServiceDescriptor::new(
                        service.id,
                        service.name,
                        service.icon.unwrap_or_else(|| DEFAULT_SERVICE_ICON.to_string()),
                    )
                })
                .collect();
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env_with_alias("TICKETDESK_DISCORD_BOT_TOKEN", "BOT_TOKEN") {
            self.discord.bot_token = secret_value(value);
        }
        if let Some(value) = read_env_with_alias("TICKETDESK_DISCORD_GUILD_ID", "GUILD_ID") {
            self.discord.guild_id = value;
        }
        if let Some(value) =
            read_env_with_alias("TICKETDESK_DISCORD_TICKET_CATEGORY_ID", "TICKET_CATEGORY_ID")
        {
            self.discord.ticket_category_id = value;
        }
        if let Some(value) = read_env_with_alias("TICKETDESK_DISCORD_STAFF_ROLE_ID", "STAFF_ROLE_ID")
        {
            self.discord.staff_role_id = value;
        }
        if let Some(value) = read_env("TICKETDESK_DISCORD_API_BASE_URL") {
            self.discord.api_base_url = value;
        }
        if let Some(value) = read_env("TICKETDESK_DISCORD_REQUEST_TIMEOUT_SECS") {
            self.discord.request_timeout_secs =
                parse_u64("TICKETDESK_DISCORD_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TICKETDESK_DISCORD_GATEWAY_URL") {
            self.discord.gateway_url = value;
        }
        if let Some(value) = read_env("TICKETDESK_DISCORD_GATEWAY_INTENTS") {
            self.discord.gateway_intents = parse_u64("TICKETDESK_DISCORD_GATEWAY_INTENTS", &value)?;
        }

        if let Some(value) = read_env("TICKETDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TICKETDESK_SERVER_PORT") {
            self.server.port = parse_u16("TICKETDESK_SERVER_PORT", &value)?;
        } else if let Some(value) = read_env("PORT") {
            self.server.port = parse_u16("PORT", &value)?;
        }

        if let Some(value) = read_env("TICKETDESK_TICKETS_DELETE_DELAY_SECS") {
            self.tickets.delete_delay_secs =
                parse_u64("TICKETDESK_TICKETS_DELETE_DELAY_SECS", &value)?;
        }

        let log_level =
            read_env("TICKETDESK_LOGGING_LEVEL").or_else(|| read_env("TICKETDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TICKETDESK_LOGGING_FORMAT").or_else(|| read_env("TICKETDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.bot_token {
            self.discord.bot_token = secret_value(bot_token);
        }
        if let Some(guild_id) = overrides.guild_id {
            self.discord.guild_id = guild_id;
        }
        if let Some(ticket_category_id) = overrides.ticket_category_id {
            self.discord.ticket_category_id = ticket_category_id;
        }
        if let Some(staff_role_id) = overrides.staff_role_id {
            self.discord.staff_role_id = staff_role_id;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(delete_delay_secs) = overrides.delete_delay_secs {
            self.tickets.delete_delay_secs = delete_delay_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_discord(&self.discord)?;
        validate_server(&self.server)?;
        validate_tickets(&self.tickets)?;
        validate_services(&self.services)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("ticketdesk.toml"), PathBuf::from("config/ticketdesk.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_discord(discord: &DiscordConfig) -> Result<(), ConfigError> {
    if discord.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "discord.bot_token is required. Get it from https://discord.com/developers/applications > Your App > Bot > Token".to_string(),
        ));
    }

    validate_snowflake("discord.guild_id", &discord.guild_id)?;
    validate_snowflake("discord.ticket_category_id", &discord.ticket_category_id)?;
    validate_snowflake("discord.staff_role_id", &discord.staff_role_id)?;

    let base_url = discord.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "discord.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if discord.request_timeout_secs == 0 || discord.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "discord.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let gateway_url = discord.gateway_url.trim();
    if !gateway_url.starts_with("ws://") && !gateway_url.starts_with("wss://") {
        return Err(ConfigError::Validation(
            "discord.gateway_url must start with ws:// or wss://".to_string(),
        ));
    }

    Ok(())
}

fn validate_snowflake(key: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{key} is required (enable Developer Mode in Discord and use Copy ID)"
        )));
    }
    if !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!("{key} must be a numeric id, got `{value}`")));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }
    Ok(())
}

fn validate_tickets(tickets: &TicketsConfig) -> Result<(), ConfigError> {
    if tickets.delete_delay_secs > 600 {
        return Err(ConfigError::Validation(
            "tickets.delete_delay_secs must be in range 0..=600".to_string(),
        ));
    }
    Ok(())
}

fn validate_services(services: &[ServiceDescriptor]) -> Result<(), ConfigError> {
    if services.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[services]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for service in services {
        if service.id.0.trim().is_empty() || service.display_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "services entries need a non-empty id and name".to_string(),
            ));
        }
        if !seen.insert(service.id.0.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate service id `{}`",
                service.id.0
            )));
        }
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_env_with_alias(key: &str, alias: &str) -> Option<String> {
    read_env(key).or_else(|| read_env(alias))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    discord: Option<DiscordPatch>,
    server: Option<ServerPatch>,
    tickets: Option<TicketsPatch>,
    panel: Option<PanelPatch>,
    services: Option<Vec<ServicePatch>>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscordPatch {
    bot_token: Option<String>,
    guild_id: Option<String>,
    ticket_category_id: Option<String>,
    staff_role_id: Option<String>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    gateway_url: Option<String>,
    gateway_intents: Option<u64>,
    presence: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct TicketsPatch {
    delete_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PanelPatch {
    title: Option<String>,
    description: Option<String>,
    footer: Option<String>,
    thumbnail_url: Option<String>,
    prompt_title: Option<String>,
    prompt_description: Option<String>,
    prompt_footer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServicePatch {
    id: String,
    name: String,
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
