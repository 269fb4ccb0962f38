//! Alert stream websocket protocol client implement

mod alert;
mod client;
mod endpoint;
pub(crate) mod frame;

pub use alert::{Alert, Severity};
pub use client::{ConnectionState, StreamClient};
pub use endpoint::{ParseEndpointError, StreamEndpoint};
