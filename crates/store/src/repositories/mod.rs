use async_trait::async_trait;
use thiserror::Error;

use ticketdesk_core::domain::ticket::{ChannelId, Ticket, UserId};

pub mod memory;

pub use memory::InMemoryTicketRepository;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("a ticket is already tracked for channel {0}")]
    Duplicate(ChannelId),
    #[error("no ticket is tracked for channel {0}")]
    NotFound(ChannelId),
    #[error(transparent)]
    Domain(#[from] ticketdesk_core::DomainError),
}

/// Channel id -> ticket record.
///
/// The only implementation today keeps records in memory for the life of
/// the process; the trait exists so a durable backend can slot in behind
/// the controller.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn put(&self, ticket: Ticket) -> Result<(), RepositoryError>;
    async fn get(&self, channel_id: &ChannelId) -> Result<Option<Ticket>, RepositoryError>;
    async fn set_claimed(
        &self,
        channel_id: &ChannelId,
        staff_id: &UserId,
    ) -> Result<Ticket, RepositoryError>;
    async fn set_deleted(&self, channel_id: &ChannelId) -> Result<Ticket, RepositoryError>;
    async fn len(&self) -> Result<usize, RepositoryError>;
}
