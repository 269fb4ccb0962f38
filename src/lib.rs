//! # Wardlink
//!
//! A real-time clinical alert stream client.
//!
//! [`StreamClient`] keeps one long-lived websocket connection to an alert
//! stream endpoint, decodes inbound alert frames, keeps a bounded buffer of
//! recent alerts, and reconnects on its own with exponential backoff after
//! any connection loss. The embedding application supplies a bearer token
//! and an [`AlertHandler`]; the handler can be swapped at any time without
//! disturbing the connection.

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod filter;
pub mod ws;

mod error;
mod handler;

pub use error::Error;
pub use handler::AlertHandler;
pub use ws::{Alert, ConnectionState, Severity, StreamClient, StreamEndpoint};

/// crate result type
pub type Result<T> = std::result::Result<T, Error>;
