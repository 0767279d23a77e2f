//! Gateway bus: the shared channel every adapter writes inbound messages to.
//!
//! One bus per gateway; senders are cloned into each adapter, the hub owns the receiver.

use crate::message::GatewayMessage;
use tokio::sync::mpsc;

/// Default number of messages buffered before adapters wait on the hub.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Returned when the hub side of the bus has been dropped.
#[derive(Debug, Clone, thiserror::Error)]
#[error("gateway bus closed")]
pub struct BusClosed;

/// Adapter-side handle for forwarding messages onto the bus.
#[derive(Debug, Clone)]
pub struct BusSender {
    tx: mpsc::Sender<GatewayMessage>,
}

/// Hub-side handle; yields messages in the order adapters forwarded them.
pub struct BusReceiver {
    rx: mpsc::Receiver<GatewayMessage>,
}

/// Create a bus with the given buffer capacity.
pub fn bus(capacity: usize) -> (BusSender, BusReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (BusSender { tx }, BusReceiver { rx })
}

impl BusSender {
    /// Forward a message; waits while the bus is full.
    pub async fn forward(&self, msg: GatewayMessage) -> Result<(), BusClosed> {
        self.tx.send(msg).await.map_err(|_| BusClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl BusReceiver {
    /// Next message, or None once every sender is gone.
    pub async fn recv(&mut self) -> Option<GatewayMessage> {
        self.rx.recv().await
    }

    /// Non-blocking receive; None if nothing is queued right now.
    pub fn try_recv(&mut self) -> Option<GatewayMessage> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forward_preserves_order() {
        let (tx, mut rx) = bus(4);
        tx.forward(GatewayMessage::new("a", "1", "#c")).await.unwrap();
        tx.forward(GatewayMessage::new("a", "2", "#c")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().text, "1");
        assert_eq!(rx.recv().await.unwrap().text, "2");
        assert!(rx.try_recv().is_none());
    }

    #[tokio::test]
    async fn forward_after_receiver_dropped_fails() {
        let (tx, rx) = bus(1);
        drop(rx);
        assert!(tx.is_closed());
        assert!(tx.forward(GatewayMessage::new("a", "b", "#c")).await.is_err());
    }
}
