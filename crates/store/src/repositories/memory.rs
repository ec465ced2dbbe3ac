use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::RwLock;

use ticketdesk_core::domain::ticket::{ChannelId, Ticket, UserId};

use super::{RepositoryError, TicketRepository};

#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: RwLock<HashMap<String, Ticket>>,
}

#[async_trait::async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn put(&self, ticket: Ticket) -> Result<(), RepositoryError> {
        let mut tickets = self.tickets.write().await;
        match tickets.entry(ticket.channel_id.0.clone()) {
            Entry::Occupied(_) => Err(RepositoryError::Duplicate(ticket.channel_id)),
            Entry::Vacant(slot) => {
                slot.insert(ticket);
                Ok(())
            }
        }
    }

    async fn get(&self, channel_id: &ChannelId) -> Result<Option<Ticket>, RepositoryError> {
        let tickets = self.tickets.read().await;
        Ok(tickets.get(&channel_id.0).cloned())
    }

    async fn set_claimed(
        &self,
        channel_id: &ChannelId,
        staff_id: &UserId,
    ) -> Result<Ticket, RepositoryError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get_mut(&channel_id.0)
            .ok_or_else(|| RepositoryError::NotFound(channel_id.clone()))?;
        ticket.claim(staff_id.clone())?;
        Ok(ticket.clone())
    }

    async fn set_deleted(&self, channel_id: &ChannelId) -> Result<Ticket, RepositoryError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get_mut(&channel_id.0)
            .ok_or_else(|| RepositoryError::NotFound(channel_id.clone()))?;
        ticket.mark_deleted()?;
        Ok(ticket.clone())
    }

    async fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.tickets.read().await.len())
    }
}
