//! Matrix adapter: the gateway-facing facade that owns the session and the sync task.

use crate::backoff::Backoff;
use crate::client::{NetworkClient, Session};
use crate::error::MatrixError;
use crate::registry::RoomRegistry;
use crate::sdk::{SdkClient, SdkOptions};
use crate::sync::{SyncHealth, SyncLoop};
use crate::translate::{self, Outbound};
use async_trait::async_trait;
use lib::config::MatrixConfig;
use lib::{Adapter, BusSender, ChannelInfo, GatewayMessage};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Live session plus the handle needed to stop its sync task.
struct Connection {
    session: Session,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// One Matrix account bridged onto the gateway bus.
pub struct MatrixAdapter {
    config: MatrixConfig,
    client: Arc<dyn NetworkClient>,
    registry: RoomRegistry,
    bus: BusSender,
    health: Arc<watch::Sender<SyncHealth>>,
    connection: Mutex<Option<Connection>>,
}

impl MatrixAdapter {
    /// Adapter talking to the configured homeserver through matrix-sdk.
    pub fn new(config: MatrixConfig, bus: BusSender) -> Self {
        let client = Arc::new(SdkClient::new(SdkOptions::from(&config)));
        Self::with_client(config, bus, client)
    }

    /// Adapter over any network client implementation.
    pub fn with_client(
        config: MatrixConfig,
        bus: BusSender,
        client: Arc<dyn NetworkClient>,
    ) -> Self {
        let (health, _) = watch::channel(SyncHealth::Idle);
        Self {
            config,
            client,
            registry: RoomRegistry::new(),
            bus,
            health: Arc::new(health),
            connection: Mutex::new(None),
        }
    }

    pub fn account(&self) -> &str {
        &self.config.account
    }

    /// Room mappings created by `join_channel`.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Sync loop health; starts as `Idle`, `Stopped` after disconnect.
    pub fn health(&self) -> watch::Receiver<SyncHealth> {
        self.health.subscribe()
    }

    /// Our Matrix user id while connected.
    pub async fn user_id(&self) -> Option<String> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|c| c.session.user_id.clone())
    }

    /// Log in and start the sync task. Returns once authenticated.
    ///
    /// While connected this is a no-op, unless the sync task has exited (e.g. the bus closed):
    /// then the task is restarted on the existing session.
    pub async fn connect(&self) -> Result<(), MatrixError> {
        let mut conn = self.connection.lock().await;
        if let Some(live) = conn.take() {
            let exited =
                live.task.is_finished() || *self.health.borrow() == SyncHealth::Stopped;
            if !exited {
                log::debug!("matrix: {} already connected", self.config.account);
                *conn = Some(live);
                return Ok(());
            }
            log::info!(
                "matrix: sync task for {} has exited, restarting it",
                self.config.account
            );
            if let Err(e) = live.task.await {
                log::warn!("matrix: sync task ended abnormally: {}", e);
            }
            *conn = Some(self.start_sync(live.session));
            return Ok(());
        }
        log::info!("matrix: connecting {}", self.config.server);
        let password = self.config.password.as_deref().unwrap_or_default();
        let session = self
            .client
            .authenticate(&self.config.server, &self.config.login, password)
            .await
            .map_err(|e| {
                log::debug!("matrix: login failed: {:?}", e);
                e
            })?;
        log::info!("matrix: connection succeeded as {}", session.user_id);
        *conn = Some(self.start_sync(session));
        Ok(())
    }

    fn start_sync(&self, session: Session) -> Connection {
        let cancel = CancellationToken::new();
        let task = SyncLoop {
            client: self.client.clone(),
            registry: self.registry.clone(),
            bus: self.bus.clone(),
            self_id: session.user_id.clone(),
            account: self.config.account.clone(),
            strip_suffix: self.config.no_home_server_suffix,
            backoff: Backoff::from(&self.config.backoff),
            health: self.health.clone(),
            cancel: cancel.clone(),
        }
        .spawn();
        Connection {
            session,
            cancel,
            task,
        }
    }

    /// Stop the sync task and wait for it to exit. Always succeeds; safe to call when not connected.
    pub async fn disconnect(&self) -> Result<(), MatrixError> {
        let Some(conn) = self.connection.lock().await.take() else {
            return Ok(());
        };
        log::info!("matrix: disconnecting {}", self.config.account);
        conn.cancel.cancel();
        if let Err(e) = conn.task.await {
            log::warn!("matrix: sync task ended abnormally: {}", e);
            self.health.send_replace(SyncHealth::Stopped);
        }
        Ok(())
    }

    /// Join the room named by `channel` and bridge it. Safe while the sync task is running.
    pub async fn join_channel(&self, channel: &ChannelInfo) -> Result<(), MatrixError> {
        self.ensure_connected().await?;
        let room_id = self.client.join_room(&channel.name).await?;
        log::info!("matrix: joined {} as {}", channel.name, room_id);
        self.registry.put(room_id, channel.name.clone()).await;
        Ok(())
    }

    /// Send a gateway message to its channel's room. Deletes are accepted and dropped.
    /// Matrix event ids are not reported, so success is always `Ok(None)`.
    pub async fn send(&self, msg: &GatewayMessage) -> Result<Option<String>, MatrixError> {
        log::debug!("matrix: receiving {:?}", msg);
        if msg.is_delete() {
            return Ok(None);
        }
        self.ensure_connected().await?;
        let room_id = self
            .registry
            .room_for_channel(&msg.channel)
            .await
            .ok_or_else(|| MatrixError::NotJoined {
                channel: msg.channel.clone(),
            })?;
        log::debug!("matrix: sending to room {}", room_id);
        match translate::to_network_send(msg, &room_id) {
            Outbound::Noop => {}
            Outbound::Text { room_id, body } => self.client.send_text(&room_id, &body).await?,
            Outbound::Emote { room_id, body } => self.client.send_emote(&room_id, &body).await?,
        }
        Ok(None)
    }

    async fn ensure_connected(&self) -> Result<(), MatrixError> {
        if self.connection.lock().await.is_some() {
            Ok(())
        } else {
            Err(MatrixError::NotConnected)
        }
    }
}

#[async_trait]
impl Adapter for MatrixAdapter {
    type Error = MatrixError;

    fn account(&self) -> &str {
        MatrixAdapter::account(self)
    }

    async fn connect(&self) -> Result<(), MatrixError> {
        MatrixAdapter::connect(self).await
    }

    async fn disconnect(&self) -> Result<(), MatrixError> {
        MatrixAdapter::disconnect(self).await
    }

    async fn join_channel(&self, channel: &ChannelInfo) -> Result<(), MatrixError> {
        MatrixAdapter::join_channel(self, channel).await
    }

    async fn send(&self, msg: &GatewayMessage) -> Result<Option<String>, MatrixError> {
        MatrixAdapter::send(self, msg).await
    }
}
