//! Adapter contract: what the gateway hub calls on every network adapter.

use crate::message::GatewayMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One configured channel to bridge (e.g. a Matrix room alias).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub name: String,
}

impl ChannelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A network adapter bound to one account. Inbound messages go to the bus handed to it at construction.
#[async_trait]
pub trait Adapter: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Account id (e.g. "matrix.home").
    fn account(&self) -> &str;

    /// Authenticate and start receiving. Returns once authenticated.
    async fn connect(&self) -> Result<(), Self::Error>;

    /// Stop receiving. Never fails.
    async fn disconnect(&self) -> Result<(), Self::Error>;

    /// Join a network conversation and bridge it under `channel.name`.
    async fn join_channel(&self, channel: &ChannelInfo) -> Result<(), Self::Error>;

    /// Deliver a message to the network. Returns the network message id when one is known.
    async fn send(&self, msg: &GatewayMessage) -> Result<Option<String>, Self::Error>;
}
