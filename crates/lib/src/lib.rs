//! Bridge core library: gateway-neutral message types, the gateway bus,
//! the adapter contract, and configuration shared by every network adapter.

pub mod adapter;
pub mod bus;
pub mod config;
pub mod message;

pub use adapter::{Adapter, ChannelInfo};
pub use bus::{bus, BusClosed, BusReceiver, BusSender, DEFAULT_BUS_CAPACITY};
pub use message::{EventKind, GatewayMessage};
