pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;

pub use catalog::ServiceCatalog;
pub use domain::member::{Member, Permissions};
pub use domain::service::{ServiceDescriptor, ServiceId};
pub use domain::ticket::{ChannelId, GuildId, RoleId, Ticket, TicketStatus, UserId};
pub use errors::DomainError;
pub use lifecycle::{
    LifecycleError, TicketAction, TicketContext, TicketEvent, TicketLifecycle, TransitionOutcome,
};
