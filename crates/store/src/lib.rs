pub mod repositories;

pub use repositories::{InMemoryTicketRepository, RepositoryError, TicketRepository};
