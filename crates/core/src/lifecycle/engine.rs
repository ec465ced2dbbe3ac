use thiserror::Error;

use crate::domain::ticket::TicketStatus;
use crate::lifecycle::states::{TicketAction, TicketContext, TicketEvent, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("ticket category is not available")]
    CategoryUnavailable,
    #[error("staff role is not available")]
    StaffRoleUnavailable,
    #[error("no ticket is tracked for this channel ({event:?})")]
    UnknownTicket { event: TicketEvent },
    #[error("ticket is already closed ({event:?})")]
    Closed { event: TicketEvent },
    #[error("invalid ticket transition from {state:?} using event {event:?}")]
    InvalidTransition { state: Option<TicketStatus>, event: TicketEvent },
}

/// Ticket state machine: (none) -> Open -> Claimed -> Deleted.
///
/// `apply` is pure. It decides the next status and the ordered side effects;
/// executing them is left to the caller.
#[derive(Clone, Debug, Default)]
pub struct TicketLifecycle;

impl TicketLifecycle {
    pub fn apply(
        &self,
        current: Option<TicketStatus>,
        event: &TicketEvent,
        context: &TicketContext,
    ) -> Result<TransitionOutcome, LifecycleError> {
        transition(current, event, context)
    }
}

fn transition(
    current: Option<TicketStatus>,
    event: &TicketEvent,
    context: &TicketContext,
) -> Result<TransitionOutcome, LifecycleError> {
    use TicketAction::{
        AnnounceClaim, AnnounceCountdown, ConfirmCreation, CreateChannel, DeferAcknowledgement,
        DenyPermission, MarkDeleted, NotifyOwner, PostControls, RecordClaim,
        ScheduleChannelDeletion, StoreTicket,
    };
    use TicketEvent::{ClaimPressed, DeletePressed, ServiceSelected};
    use TicketStatus::{Claimed, Deleted, Open};

    let (to, actions) = match (current, event) {
        (None, ServiceSelected) => {
            if !context.category_available {
                return Err(LifecycleError::CategoryUnavailable);
            }
            if !context.staff_role_available {
                return Err(LifecycleError::StaffRoleUnavailable);
            }
            (Some(Open), vec![CreateChannel, StoreTicket, ConfirmCreation, PostControls])
        }
        (Some(Deleted), ClaimPressed | DeletePressed) => {
            return Err(LifecycleError::Closed { event: event.clone() });
        }
        (None, ClaimPressed) => {
            return Err(LifecycleError::UnknownTicket { event: event.clone() });
        }
        (Some(Open | Claimed), ClaimPressed) => {
            (Some(Claimed), vec![RecordClaim, NotifyOwner, AnnounceClaim, DeferAcknowledgement])
        }
        (state, DeletePressed) => {
            if !(context.actor_can_manage_channels || context.actor_is_staff) {
                (state, vec![DenyPermission])
            } else if state.is_some() {
                (Some(Deleted), vec![AnnounceCountdown, MarkDeleted, ScheduleChannelDeletion])
            } else {
                // Untracked channel (e.g. opened before a restart): the channel still goes.
                (None, vec![AnnounceCountdown, ScheduleChannelDeletion])
            }
        }
        (Some(_), ServiceSelected) => {
            return Err(LifecycleError::InvalidTransition { state: current, event: event.clone() });
        }
    };

    Ok(TransitionOutcome { from: current, to, event: event.clone(), actions })
}
