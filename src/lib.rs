//! Tether - session protocol core for a chat client talking to an AI
//! orchestration backend over one WebSocket.
//!
//! Inbound frames flow transport → router → controllers; user actions flow
//! controllers → transport. See [`session::Session`] for the entry point.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod outbound;
pub mod router;
pub mod session;
pub mod state;
pub mod traits;
pub mod websocket;
