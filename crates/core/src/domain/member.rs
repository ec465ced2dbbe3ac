use serde::{Deserialize, Serialize};

use crate::domain::ticket::{RoleId, UserId};

/// Platform permission bitfield.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permissions(pub u64);

impl Permissions {
    pub const CREATE_INSTANT_INVITE: Self = Self(1 << 0);
    pub const KICK_MEMBERS: Self = Self(1 << 1);
    pub const BAN_MEMBERS: Self = Self(1 << 2);
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const MANAGE_GUILD: Self = Self(1 << 5);
    pub const ADD_REACTIONS: Self = Self(1 << 6);
    pub const VIEW_AUDIT_LOG: Self = Self(1 << 7);
    pub const PRIORITY_SPEAKER: Self = Self(1 << 8);
    pub const STREAM: Self = Self(1 << 9);
    pub const VIEW_CHANNEL: Self = Self(1 << 10);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const SEND_TTS_MESSAGES: Self = Self(1 << 12);
    pub const MANAGE_MESSAGES: Self = Self(1 << 13);
    pub const EMBED_LINKS: Self = Self(1 << 14);
    pub const ATTACH_FILES: Self = Self(1 << 15);
    pub const READ_MESSAGE_HISTORY: Self = Self(1 << 16);
    pub const MENTION_EVERYONE: Self = Self(1 << 17);
    pub const USE_EXTERNAL_EMOJIS: Self = Self(1 << 18);
    pub const VIEW_GUILD_INSIGHTS: Self = Self(1 << 19);
    pub const CONNECT: Self = Self(1 << 20);
    pub const SPEAK: Self = Self(1 << 21);
    pub const MUTE_MEMBERS: Self = Self(1 << 22);
    pub const DEAFEN_MEMBERS: Self = Self(1 << 23);
    pub const MOVE_MEMBERS: Self = Self(1 << 24);
    pub const USE_VAD: Self = Self(1 << 25);
    pub const CHANGE_NICKNAME: Self = Self(1 << 26);
    pub const MANAGE_NICKNAMES: Self = Self(1 << 27);
    pub const MANAGE_ROLES: Self = Self(1 << 28);
    pub const MANAGE_WEBHOOKS: Self = Self(1 << 29);
    pub const MANAGE_GUILD_EXPRESSIONS: Self = Self(1 << 30);
    pub const USE_APPLICATION_COMMANDS: Self = Self(1 << 31);
    pub const REQUEST_TO_SPEAK: Self = Self(1 << 32);
    pub const MANAGE_EVENTS: Self = Self(1 << 33);
    pub const MANAGE_THREADS: Self = Self(1 << 34);
    pub const CREATE_PUBLIC_THREADS: Self = Self(1 << 35);
    pub const CREATE_PRIVATE_THREADS: Self = Self(1 << 36);
    pub const USE_EXTERNAL_STICKERS: Self = Self(1 << 37);
    pub const SEND_MESSAGES_IN_THREADS: Self = Self(1 << 38);
    pub const USE_EMBEDDED_ACTIVITIES: Self = Self(1 << 39);
    pub const MODERATE_MEMBERS: Self = Self(1 << 40);
    pub const VIEW_CREATOR_MONETIZATION_ANALYTICS: Self = Self(1 << 41);
    pub const USE_SOUNDBOARD: Self = Self(1 << 42);
    pub const CREATE_GUILD_EXPRESSIONS: Self = Self(1 << 43);
    pub const CREATE_EVENTS: Self = Self(1 << 44);
    pub const USE_EXTERNAL_SOUNDS: Self = Self(1 << 45);
    pub const SEND_VOICE_MESSAGES: Self = Self(1 << 46);
    pub const SEND_POLLS: Self = Self(1 << 49);
    pub const USE_EXTERNAL_APPS: Self = Self(1 << 50);

    const NAMED: [(Self, &'static str); 49] = [
        (Self::CREATE_INSTANT_INVITE, "create_instant_invite"),
        (Self::KICK_MEMBERS, "kick_members"),
        (Self::BAN_MEMBERS, "ban_members"),
        (Self::ADMINISTRATOR, "administrator"),
        (Self::MANAGE_CHANNELS, "manage_channels"),
        (Self::MANAGE_GUILD, "manage_guild"),
        (Self::ADD_REACTIONS, "add_reactions"),
        (Self::VIEW_AUDIT_LOG, "view_audit_log"),
        (Self::PRIORITY_SPEAKER, "priority_speaker"),
        (Self::STREAM, "stream"),
        (Self::VIEW_CHANNEL, "view_channel"),
        (Self::SEND_MESSAGES, "send_messages"),
        (Self::SEND_TTS_MESSAGES, "send_tts_messages"),
        (Self::MANAGE_MESSAGES, "manage_messages"),
        (Self::EMBED_LINKS, "embed_links"),
        (Self::ATTACH_FILES, "attach_files"),
        (Self::READ_MESSAGE_HISTORY, "read_message_history"),
        (Self::MENTION_EVERYONE, "mention_everyone"),
        (Self::USE_EXTERNAL_EMOJIS, "use_external_emojis"),
        (Self::VIEW_GUILD_INSIGHTS, "view_guild_insights"),
        (Self::CONNECT, "connect"),
        (Self::SPEAK, "speak"),
        (Self::MUTE_MEMBERS, "mute_members"),
        (Self::DEAFEN_MEMBERS, "deafen_members"),
        (Self::MOVE_MEMBERS, "move_members"),
        (Self::USE_VAD, "use_vad"),
        (Self::CHANGE_NICKNAME, "change_nickname"),
        (Self::MANAGE_NICKNAMES, "manage_nicknames"),
        (Self::MANAGE_ROLES, "manage_roles"),
        (Self::MANAGE_WEBHOOKS, "manage_webhooks"),
        (Self::MANAGE_GUILD_EXPRESSIONS, "manage_guild_expressions"),
        (Self::USE_APPLICATION_COMMANDS, "use_application_commands"),
        (Self::REQUEST_TO_SPEAK, "request_to_speak"),
        (Self::MANAGE_EVENTS, "manage_events"),
        (Self::MANAGE_THREADS, "manage_threads"),
        (Self::CREATE_PUBLIC_THREADS, "create_public_threads"),
        (Self::CREATE_PRIVATE_THREADS, "create_private_threads"),
        (Self::USE_EXTERNAL_STICKERS, "use_external_stickers"),
        (Self::SEND_MESSAGES_IN_THREADS, "send_messages_in_threads"),
        (Self::USE_EMBEDDED_ACTIVITIES, "use_embedded_activities"),
        (Self::MODERATE_MEMBERS, "moderate_members"),
        (Self::VIEW_CREATOR_MONETIZATION_ANALYTICS, "view_creator_monetization_analytics"),
        (Self::USE_SOUNDBOARD, "use_soundboard"),
        (Self::CREATE_GUILD_EXPRESSIONS, "create_guild_expressions"),
        (Self::CREATE_EVENTS, "create_events"),
        (Self::USE_EXTERNAL_SOUNDS, "use_external_sounds"),
        (Self::SEND_VOICE_MESSAGES, "send_voice_messages"),
        (Self::SEND_POLLS, "send_polls"),
        (Self::USE_EXTERNAL_APPS, "use_external_apps"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Like `contains`, except `ADMINISTRATOR` grants everything.
    pub const fn allows(self, other: Self) -> bool {
        self.contains(Self::ADMINISTRATOR) || self.contains(other)
    }

    /// snake_case names of every set flag, in bit order. Bits without a
    /// documented name are listed as `unknown(1<<n)`.
    pub fn names(self) -> Vec<String> {
        (0..u64::BITS)
            .map(|bit| Self(1 << bit))
            .filter(|flag| self.contains(*flag))
            .map(|flag| match Self::NAMED.iter().find(|(named, _)| *named == flag) {
                Some((_, name)) => (*name).to_owned(),
                None => format!("unknown(1<<{})", flag.0.trailing_zeros()),
            })
            .collect()
    }

    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<u64>().ok().map(Self)
    }
}

/// A guild member as seen on an incoming interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub username: String,
    pub roles: Vec<RoleId>,
    pub permissions: Permissions,
}

impl Member {
    pub fn has_role(&self, role_id: &RoleId) -> bool {
        self.roles.iter().any(|role| role == role_id)
    }
}
