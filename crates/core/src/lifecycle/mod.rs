pub mod engine;
pub mod states;

pub use engine::{LifecycleError, TicketLifecycle};
pub use states::{TicketAction, TicketContext, TicketEvent, TransitionOutcome};
