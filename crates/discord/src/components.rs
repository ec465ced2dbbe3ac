use serde::{Serialize, Serializer};

use ticketdesk_core::config::PanelConfig;
use ticketdesk_core::domain::service::ServiceDescriptor;
use ticketdesk_core::domain::ticket::{ChannelId, UserId};
use ticketdesk_core::ServiceCatalog;

pub const SERVICE_SELECT_ID: &str = "service_select";
pub const CLAIM_TICKET_ID: &str = "claim_ticket";
pub const DELETE_TICKET_ID: &str = "delete_ticket";

pub const PANEL_COLOR: u32 = 0x000000;
pub const TICKET_COLOR: u32 = 0xffffff;

const ACTION_ROW_TYPE: u8 = 1;
const BUTTON_TYPE: u8 = 2;
const STRING_SELECT_TYPE: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
}

impl Serialize for ButtonStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Either a unicode emoji or a custom guild emoji written as `<:name:id>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Emoji {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub animated: bool,
}

impl Emoji {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let Some(inner) = raw.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')) else {
            return Some(Self { id: None, name: raw.to_owned(), animated: false });
        };

        let mut parts = inner.split(':');
        let animated = match parts.next() {
            Some("a") => true,
            Some("") => false,
            _ => return None,
        };
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(id), None) if !name.is_empty() && !id.is_empty() => {
                Some(Self { id: Some(id.to_owned()), name: name.to_owned(), animated })
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonComponent {
    #[serde(rename = "type")]
    kind: u8,
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl ButtonComponent {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: BUTTON_TYPE,
            custom_id: custom_id.into(),
            label: label.into(),
            style: ButtonStyle::Secondary,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectMenuComponent {
    #[serde(rename = "type")]
    kind: u8,
    pub custom_id: String,
    pub placeholder: String,
    pub min_values: u8,
    pub max_values: u8,
    pub options: Vec<SelectOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Component {
    Button(ButtonComponent),
    StringSelect(SelectMenuComponent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    pub components: Vec<Component>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedImage>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
}

impl OutgoingMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }
}

#[derive(Default)]
pub struct MessageBuilder {
    embeds: Vec<Embed>,
    rows: Vec<ActionRow>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embed<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut EmbedBuilder),
    {
        let mut builder = EmbedBuilder::default();
        build(&mut builder);
        self.embeds.push(builder.build());
        self
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut builder = RowBuilder::default();
        build(&mut builder);
        self.rows.push(builder.build());
        self
    }

    pub fn push_row(mut self, row: ActionRow) -> Self {
        self.rows.push(row);
        self
    }

    pub fn build(self) -> OutgoingMessage {
        OutgoingMessage { content: None, embeds: self.embeds, components: self.rows }
    }
}

#[derive(Default)]
pub struct EmbedBuilder {
    embed: Embed,
}

impl EmbedBuilder {
    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.embed.title = Some(title.into());
        self
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.embed.description = Some(description.into());
        self
    }

    pub fn color(&mut self, color: u32) -> &mut Self {
        self.embed.color = Some(color);
        self
    }

    pub fn footer(&mut self, text: impl Into<String>) -> &mut Self {
        self.embed.footer = Some(EmbedFooter { text: text.into() });
        self
    }

    pub fn thumbnail(&mut self, url: impl Into<String>) -> &mut Self {
        self.embed.thumbnail = Some(EmbedImage { url: url.into() });
        self
    }

    fn build(self) -> Embed {
        self.embed
    }
}

#[derive(Default)]
pub struct RowBuilder {
    components: Vec<Component>,
}

impl RowBuilder {
    pub fn button(&mut self, button: ButtonComponent) -> &mut Self {
        self.components.push(Component::Button(button));
        self
    }

    pub fn select(&mut self, menu: SelectMenuComponent) -> &mut Self {
        self.components.push(Component::StringSelect(menu));
        self
    }

    fn build(self) -> ActionRow {
        ActionRow { kind: ACTION_ROW_TYPE, components: self.components }
    }
}

pub fn service_select_menu(catalog: &ServiceCatalog) -> SelectMenuComponent {
    SelectMenuComponent {
        kind: STRING_SELECT_TYPE,
        custom_id: SERVICE_SELECT_ID.to_owned(),
        placeholder: "Select Which Service You Want To Buy".to_owned(),
        min_values: 1,
        max_values: 1,
        options: catalog
            .list()
            .iter()
            .map(|service| SelectOption {
                label: service.display_name.clone(),
                value: service.id.0.clone(),
                emoji: Emoji::parse(&service.icon),
            })
            .collect(),
    }
}

/// Public panel posted by `/setup_tickets`.
pub fn catalog_panel(panel: &PanelConfig, catalog: &ServiceCatalog) -> OutgoingMessage {
    MessageBuilder::new()
        .embed(|embed| {
            embed
                .title(panel.title.clone())
                .description(panel.description.clone())
                .color(PANEL_COLOR)
                .footer(panel.footer.clone());
            if let Some(url) = &panel.thumbnail_url {
                embed.thumbnail(url.clone());
            }
        })
        .row(|row| {
            row.select(service_select_menu(catalog));
        })
        .build()
}

/// Private prompt answered to `/ticket`.
pub fn ticket_prompt(panel: &PanelConfig, catalog: &ServiceCatalog) -> OutgoingMessage {
    MessageBuilder::new()
        .embed(|embed| {
            embed
                .title(panel.prompt_title.clone())
                .description(panel.prompt_description.clone())
                .color(TICKET_COLOR)
                .footer(panel.prompt_footer.clone());
        })
        .row(|row| {
            row.select(service_select_menu(catalog));
        })
        .build()
}

/// Claim/delete buttons for one ticket channel.
pub fn ticket_controls(channel_id: &ChannelId) -> ActionRow {
    let mut row = RowBuilder::default();
    row.button(ButtonComponent::new(format!("{CLAIM_TICKET_ID}:{channel_id}"), "Claim Ticket"))
        .button(ButtonComponent::new(format!("{DELETE_TICKET_ID}:{channel_id}"), "Delete Ticket"));
    row.build()
}

pub fn ticket_welcome(
    channel_id: &ChannelId,
    service: &ServiceDescriptor,
    owner_id: &UserId,
) -> OutgoingMessage {
    MessageBuilder::new()
        .embed(|embed| {
            embed
                .title("Ticket opened, Wait for any admin to claim the ticket.")
                .description(format!(
                    "Service: {}\nUser: {}",
                    service.display_name,
                    owner_id.mention()
                ))
                .color(TICKET_COLOR);
        })
        .push_row(ticket_controls(channel_id))
        .build()
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use ticketdesk_core::config::PanelConfig;
    use ticketdesk_core::domain::ticket::{ChannelId, UserId};
    use ticketdesk_core::ServiceCatalog;

    use super::{
        catalog_panel, ticket_prompt, ticket_welcome, ButtonComponent, ButtonStyle, Component,
        Emoji, MessageBuilder,
    };

    #[test]
    fn custom_emoji_markup_is_parsed() {
        let emoji = Emoji::parse("<:qlf:1364046376249462825>").expect("custom emoji");
        assert_eq!(emoji.id.as_deref(), Some("1364046376249462825"));
        assert_eq!(emoji.name, "qlf");
        assert!(!emoji.animated);

        let animated = Emoji::parse("<a:spin:42>").expect("animated emoji");
        assert!(animated.animated);

        let unicode = Emoji::parse("🎫").expect("unicode emoji");
        assert_eq!(unicode.id, None);

        assert_eq!(Emoji::parse("<:broken>"), None);
        assert_eq!(Emoji::parse("  "), None);
    }

    #[test]
    fn buttons_serialize_with_numeric_type_and_style() {
        let message = MessageBuilder::new()
            .row(|row| {
                row.button(ButtonComponent::new("go", "Go").style(ButtonStyle::Danger));
            })
            .build();

        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(
            value,
            json!({
                "components": [{
                    "type": 1,
                    "components": [{ "type": 2, "custom_id": "go", "label": "Go", "style": 4 }]
                }]
            })
        );
    }

    #[test]
    fn catalog_panel_lists_services_in_order() {
        let message = catalog_panel(&PanelConfig::default(), &ServiceCatalog::default());

        assert_eq!(message.embeds[0].title.as_deref(), Some("Buy QLF Stock"));
        assert_eq!(message.embeds[0].color, Some(0x000000));
        assert!(message.embeds[0].thumbnail.is_some());

        let Component::StringSelect(menu) = &message.components[0].components[0] else {
            panic!("expected a select menu");
        };
        assert_eq!(menu.custom_id, "service_select");
        let values: Vec<&str> = menu.options.iter().map(|option| option.value.as_str()).collect();
        assert_eq!(values, vec!["SynthX", "Boosts Reward"]);
        assert_eq!((menu.min_values, menu.max_values), (1, 1));
    }

    #[test]
    fn ticket_prompt_uses_prompt_texts() {
        let message = ticket_prompt(&PanelConfig::default(), &ServiceCatalog::default());
        assert_eq!(message.embeds[0].title.as_deref(), Some("Assistance"));
        assert_eq!(message.embeds[0].thumbnail, None);
    }

    #[test]
    fn welcome_message_carries_channel_scoped_controls() {
        let catalog = ServiceCatalog::default();
        let service = &catalog.list()[0];
        let message =
            ticket_welcome(&ChannelId("900".to_owned()), service, &UserId("42".to_owned()));

        assert_eq!(
            message.embeds[0].description.as_deref(),
            Some("Service: SynthX - Tha Bronx 3\nUser: <@42>")
        );
        let ids: Vec<&str> = message.components[0]
            .components
            .iter()
            .map(|component| match component {
                Component::Button(button) => button.custom_id.as_str(),
                Component::StringSelect(menu) => menu.custom_id.as_str(),
            })
            .collect();
        assert_eq!(ids, vec!["claim_ticket:900", "delete_ticket:900"]);
    }
}
