//! Sync loop: pulls events from the homeserver and forwards them to the gateway bus.
//!
//! Runs as one task per connected adapter. Failed syncs are retried forever with backoff;
//! failures never propagate to callers and are only visible through [`SyncHealth`].

use crate::backoff::Backoff;
use crate::client::{InboundEvent, NetworkClient};
use crate::registry::RoomRegistry;
use crate::translate;
use lib::{BusClosed, BusSender, GatewayMessage};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Observable state of the sync loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncHealth {
    /// Not started (adapter not connected yet).
    Idle,
    /// Last sync succeeded.
    Running,
    /// Syncs are failing; the loop keeps retrying.
    Failing {
        consecutive_failures: u32,
        last_error: String,
    },
    /// Loop exited (disconnect or bus closed).
    Stopped,
}

impl SyncHealth {
    pub fn is_running(&self) -> bool {
        matches!(self, SyncHealth::Running)
    }
}

/// Everything the loop needs, moved into the spawned task.
pub struct SyncLoop {
    pub(crate) client: Arc<dyn NetworkClient>,
    pub(crate) registry: RoomRegistry,
    pub(crate) bus: BusSender,
    /// Our own user id; events from it are not forwarded.
    pub(crate) self_id: String,
    pub(crate) account: String,
    pub(crate) strip_suffix: bool,
    pub(crate) backoff: Backoff,
    pub(crate) health: Arc<watch::Sender<SyncHealth>>,
    pub(crate) cancel: CancellationToken,
}

impl SyncLoop {
    /// Start the loop on the runtime. Stop it by cancelling the token and awaiting the handle.
    pub fn spawn(self) -> JoinHandle<()> {
        log::info!("matrix sync loop: starting for account {}", self.account);
        self.health.send_replace(SyncHealth::Running);
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        self.health.send_replace(SyncHealth::Running);
        let mut failures: u32 = 0;
        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                r = self.client.sync() => r,
            };
            match result {
                Ok(events) => {
                    if failures > 0 {
                        log::info!("matrix sync recovered after {} failed attempts", failures);
                        failures = 0;
                        self.health.send_replace(SyncHealth::Running);
                    }
                    let delivered = tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        r = self.dispatch(events) => r,
                    };
                    if delivered.is_err() {
                        log::debug!("matrix: gateway bus closed, stopping sync loop");
                        break;
                    }
                }
                Err(e) => {
                    let delay = self.backoff.delay(failures);
                    failures = failures.saturating_add(1);
                    log::warn!(
                        "matrix sync failed (attempt {}): {}; retrying in {:?}",
                        failures,
                        e,
                        delay
                    );
                    self.health.send_replace(SyncHealth::Failing {
                        consecutive_failures: failures,
                        last_error: e.to_string(),
                    });
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
        self.health.send_replace(SyncHealth::Stopped);
        log::info!("matrix sync loop: stopped for account {}", self.account);
    }

    /// Translate and forward events in the order they were received.
    async fn dispatch(&self, events: Vec<InboundEvent>) -> Result<(), BusClosed> {
        for ev in events {
            if let Some(msg) = self.translate(&ev).await {
                log::debug!(
                    "matrix: forwarding message from {} on {} to gateway",
                    ev.sender_id,
                    self.account
                );
                self.bus.forward(msg).await?;
            }
        }
        Ok(())
    }

    async fn translate(&self, ev: &InboundEvent) -> Option<GatewayMessage> {
        let msg = translate::from_network_event(ev, &self.self_id, self.strip_suffix)?;
        let Some(channel) = self.registry.channel_for_room(&ev.room_id).await else {
            log::debug!("matrix: unknown room {}", ev.room_id);
            return None;
        };
        Some(GatewayMessage {
            channel,
            account: self.account.clone(),
            ..msg
        })
    }
}
