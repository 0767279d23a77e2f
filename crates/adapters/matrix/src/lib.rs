//! Matrix adapter for the bridge gateway.
//!
//! Joins configured rooms, forwards room messages onto the gateway bus, and sends gateway
//! messages back into rooms. [`MatrixAdapter`] is the entry point; it drives a
//! [`NetworkClient`] (by default [`SdkClient`], built on matrix-sdk) and runs one sync task per connection.

mod adapter;
mod backoff;
mod client;
mod error;
mod registry;
mod sdk;
mod sync;
pub mod translate;

pub use adapter::MatrixAdapter;
pub use backoff::Backoff;
pub use client::{InboundEvent, MessageSubtype, NetworkClient, Session};
pub use error::MatrixError;
pub use registry::RoomRegistry;
pub use sdk::{SdkClient, SdkOptions};
pub use sync::SyncHealth;
