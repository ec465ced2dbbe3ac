use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::service::ServiceId;
use crate::errors::DomainError;
use crate::lifecycle::{LifecycleError, TicketEvent};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuildId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ChannelId {
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}

impl UserId {
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Claimed,
    Deleted,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Claimed => "claimed",
            Self::Deleted => "deleted",
        }
    }
}

/// One service request and the private channel that hosts it.
///
/// `claimed_by` survives deletion: a deleted ticket still reports who
/// claimed it last.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub channel_id: ChannelId,
    pub owner_id: UserId,
    pub service_id: ServiceId,
    pub status: TicketStatus,
    pub claimed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn open(channel_id: ChannelId, owner_id: UserId, service_id: ServiceId) -> Self {
        Self {
            channel_id,
            owner_id,
            service_id,
            status: TicketStatus::Open,
            claimed_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == TicketStatus::Deleted
    }

    /// Records `staff_id` as the claimant. A second claim overwrites the first.
    pub fn claim(&mut self, staff_id: UserId) -> Result<(), DomainError> {
        if self.is_closed() {
            return Err(LifecycleError::Closed { event: TicketEvent::ClaimPressed }.into());
        }
        self.status = TicketStatus::Claimed;
        self.claimed_by = Some(staff_id);
        Ok(())
    }

    pub fn mark_deleted(&mut self) -> Result<(), DomainError> {
        if self.is_closed() {
            return Err(LifecycleError::Closed { event: TicketEvent::DeletePressed }.into());
        }
        self.status = TicketStatus::Deleted;
        Ok(())
    }
}
