use serde::{Deserialize, Serialize};

use crate::domain::ticket::TicketStatus;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    ServiceSelected,
    ClaimPressed,
    DeletePressed,
}

/// Facts the guards need. Gathered by the caller before the transition runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TicketContext {
    pub category_available: bool,
    pub staff_role_available: bool,
    pub actor_can_manage_channels: bool,
    pub actor_is_staff: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketAction {
    CreateChannel,
    StoreTicket,
    ConfirmCreation,
    PostControls,
    RecordClaim,
    NotifyOwner,
    AnnounceClaim,
    DeferAcknowledgement,
    AnnounceCountdown,
    MarkDeleted,
    ScheduleChannelDeletion,
    DenyPermission,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Option<TicketStatus>,
    pub to: Option<TicketStatus>,
    pub event: TicketEvent,
    pub actions: Vec<TicketAction>,
}

