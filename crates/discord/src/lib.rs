//! Discord interface for ticketdesk
//!
//! - **Interactions** (`interactions`) - payload decoding and classification
//! - **Router** (`router`) - one entry point per interaction, exactly one reply
//! - **Controller** (`controller`) - runs ticket transitions and their side effects
//! - **Components** (`components`) - embeds, select menus and ticket buttons
//! - **Gateway** (`gateway`, `rest`) - platform operations and the HTTP adapter
//! - **Runner** (`runner`) - pumps a `GatewayTransport` with reconnect backoff
//! - **WebSocket** (`websocket`) - the live gateway connection: handshake, heartbeats, presence
//!
//! # Architecture
//!
//! ```text
//! GatewayTransport → GatewayRunner → InteractionRouter → TicketController
//!                                          ↓                   ↓
//!                                    Gateway (replies)   TicketRepository
//! ```

pub mod commands;
pub mod components;
pub mod controller;
pub mod gateway;
pub mod interactions;
pub mod rest;
pub mod router;
pub mod runner;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{TicketController, TicketSettings};
pub use gateway::{Gateway, GatewayError, InteractionResponse, Responder};
pub use interactions::{parse_interaction, Interaction, InteractionKind};
pub use rest::RestGateway;
pub use router::{InteractionRouter, RouteError, RouteOutcome};
pub use runner::{GatewayRunner, GatewayTransport, ReconnectPolicy, TransportError};
pub use websocket::WebSocketTransport;
