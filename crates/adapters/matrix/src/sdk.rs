//! NetworkClient over matrix-sdk: login, join, send, and one sync per cycle.
//!
//! Room events reach us through sdk event handlers, which run inside `sync_once` after
//! decryption. They are buffered and handed to the sync loop when `sync_once` returns.

use crate::client::{InboundEvent, MessageSubtype, NetworkClient, Session};
use crate::error::MatrixError;
use async_trait::async_trait;
use lib::config::MatrixConfig;
use matrix_sdk::config::SyncSettings;
use matrix_sdk::ruma::events::room::encrypted::OriginalSyncRoomEncryptedEvent;
use matrix_sdk::ruma::events::room::message::{
    OriginalSyncRoomMessageEvent, RoomMessageEventContent,
};
use matrix_sdk::ruma::events::room::redaction::OriginalSyncRoomRedactionEvent;
use matrix_sdk::ruma::{RoomId, RoomOrAliasId};
use matrix_sdk::{Client, Room};
use std::future::{Future, IntoFuture};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

const DEVICE_DISPLAY_NAME: &str = "bridge";

/// Timeouts, store location, and sync behavior for [`SdkClient`].
#[derive(Debug, Clone)]
pub struct SdkOptions {
    /// Server-side long-poll duration for /sync.
    pub sync_timeout: Duration,
    /// Client-side limit per call; /sync gets this on top of `sync_timeout`.
    pub request_timeout: Duration,
    /// Discard the events of the first sync (only keep its batch token).
    pub skip_initial_backlog: bool,
    /// Directory for the sdk's sqlite state and crypto store. In-memory when None.
    pub store_path: Option<PathBuf>,
}

impl SdkOptions {
    /// Overall limit for one /sync call.
    pub fn sync_deadline(&self) -> Duration {
        self.sync_timeout.saturating_add(self.request_timeout)
    }
}

impl Default for SdkOptions {
    fn default() -> Self {
        Self::from(&MatrixConfig::default())
    }
}

impl From<&MatrixConfig> for SdkOptions {
    fn from(c: &MatrixConfig) -> Self {
        Self {
            sync_timeout: Duration::from_secs(c.sync_timeout_secs),
            request_timeout: Duration::from_secs(c.request_timeout_secs),
            skip_initial_backlog: c.skip_initial_backlog,
            store_path: c.store_path.clone(),
        }
    }
}

type Pending = Arc<std::sync::Mutex<Vec<InboundEvent>>>;

/// Matrix client backed by matrix-sdk. The sdk client is built by `authenticate`.
pub struct SdkClient {
    options: SdkOptions,
    client: RwLock<Option<Client>>,
    /// Batch token for the next sync; None before the first sync.
    since: Mutex<Option<String>>,
    /// Events collected by the handlers during the current sync.
    pending: Pending,
}

impl SdkClient {
    pub fn new(options: SdkOptions) -> Self {
        Self {
            options,
            client: RwLock::new(None),
            since: Mutex::new(None),
            pending: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    async fn client(&self) -> Result<Client, MatrixError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(MatrixError::NotConnected)
    }

    fn register_handlers(&self, client: &Client) {
        let pending = self.pending.clone();
        client.add_event_handler(move |ev: OriginalSyncRoomMessageEvent, room: Room| {
            let pending = pending.clone();
            async move {
                push(&pending, message_event(room.room_id().as_str(), &ev));
            }
        });
        let pending = self.pending.clone();
        client.add_event_handler(move |ev: OriginalSyncRoomRedactionEvent, room: Room| {
            let pending = pending.clone();
            async move {
                push(&pending, redaction_event(room.room_id().as_str(), &ev));
            }
        });
        client.add_event_handler(|ev: OriginalSyncRoomEncryptedEvent, room: Room| async move {
            log::warn!(
                "matrix: could not decrypt event {} from {} in {}",
                ev.event_id,
                ev.sender,
                room.room_id()
            );
        });
    }

    fn take_pending(&self) -> Vec<InboundEvent> {
        let mut g = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        std::mem::take(&mut *g)
    }

    async fn send_content(
        &self,
        room_id: &str,
        content: RoomMessageEventContent,
    ) -> Result<(), MatrixError> {
        let client = self.client().await?;
        let id = RoomId::parse(room_id)
            .map_err(|e| MatrixError::Send(format!("invalid room id {}: {}", room_id, e)))?;
        let room = client
            .get_room(&id)
            .ok_or_else(|| MatrixError::Send(format!("room {} is not joined", room_id)))?;
        within(
            self.options.request_timeout,
            room.send(content).into_future(),
            MatrixError::Send,
        )
        .await?;
        Ok(())
    }
}

fn push(pending: &Pending, event: InboundEvent) {
    pending
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .push(event);
}

fn message_event(room_id: &str, ev: &OriginalSyncRoomMessageEvent) -> InboundEvent {
    InboundEvent::new(
        room_id,
        ev.sender.as_str(),
        MessageSubtype::from_msgtype(ev.content.msgtype()),
        ev.content.body(),
    )
}

/// Newer room versions carry `redacts` in the content, older ones at the top level.
fn redaction_event(room_id: &str, ev: &OriginalSyncRoomRedactionEvent) -> InboundEvent {
    let redacts = ev
        .content
        .redacts
        .as_ref()
        .or(ev.redacts.as_ref())
        .map(|id| id.to_string())
        .unwrap_or_default();
    InboundEvent::new(
        room_id,
        ev.sender.as_str(),
        MessageSubtype::Redaction { redacts },
        "",
    )
}

/// Run an sdk call with a deadline. Expiry is a retryable network error.
async fn within<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, matrix_sdk::Error>>,
    fail: fn(String) -> MatrixError,
) -> Result<T, MatrixError> {
    match tokio::time::timeout(limit, fut).await {
        Err(_) => Err(MatrixError::Network(format!(
            "request timed out after {:?}",
            limit
        ))),
        Ok(Err(e)) => Err(classify(&e, fail)),
        Ok(Ok(v)) => Ok(v),
    }
}

/// The server answered with a 4xx: caller's failure kind. 5xx, 429, and transport errors are transient.
fn classify(e: &matrix_sdk::Error, fail: fn(String) -> MatrixError) -> MatrixError {
    match e.as_client_api_error() {
        Some(api) if api.status_code.is_server_error() || api.status_code.as_u16() == 429 => {
            MatrixError::Network(e.to_string())
        }
        Some(_) => fail(e.to_string()),
        None => MatrixError::Network(e.to_string()),
    }
}

#[async_trait]
impl NetworkClient for SdkClient {
    async fn authenticate(
        &self,
        server: &str,
        login: &str,
        password: &str,
    ) -> Result<Session, MatrixError> {
        let mut builder = Client::builder().homeserver_url(server.trim());
        if let Some(ref path) = self.options.store_path {
            builder = builder.sqlite_store(path, None);
        }
        let client = builder
            .build()
            .await
            .map_err(|e| MatrixError::Auth(format!("invalid homeserver {}: {}", server, e)))?;
        self.register_handlers(&client);
        let response = within(
            self.options.request_timeout,
            client
                .matrix_auth()
                .login_username(login, password)
                .initial_device_display_name(DEVICE_DISPLAY_NAME)
                .into_future(),
            MatrixError::Auth,
        )
        .await?;
        *self.client.write().await = Some(client);
        *self.since.lock().await = None;
        self.take_pending();
        Ok(Session {
            user_id: response.user_id.to_string(),
            access_token: response.access_token,
        })
    }

    async fn join_room(&self, room: &str) -> Result<String, MatrixError> {
        let client = self.client().await?;
        let target = RoomOrAliasId::parse(room)
            .map_err(|e| MatrixError::Join(format!("invalid room {}: {}", room, e)))?;
        let joined = within(
            self.options.request_timeout,
            client.join_room_by_id_or_alias(&target, &[]),
            MatrixError::Join,
        )
        .await?;
        Ok(joined.room_id().to_string())
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<(), MatrixError> {
        self.send_content(room_id, RoomMessageEventContent::text_plain(text))
            .await
    }

    async fn send_emote(&self, room_id: &str, text: &str) -> Result<(), MatrixError> {
        self.send_content(room_id, RoomMessageEventContent::emote_plain(text))
            .await
    }

    async fn sync(&self) -> Result<Vec<InboundEvent>, MatrixError> {
        let client = self.client().await?;
        let since = self.since.lock().await.clone();
        let mut settings = SyncSettings::default().timeout(self.options.sync_timeout);
        if let Some(ref token) = since {
            settings = settings.token(token.clone());
        }
        let response = match within(
            self.options.sync_deadline(),
            client.sync_once(settings),
            MatrixError::Network,
        )
        .await
        {
            Ok(r) => r,
            Err(e) => {
                // The token did not advance; the next sync yields these events again.
                self.take_pending();
                return Err(e);
            }
        };
        *self.since.lock().await = Some(response.next_batch);
        let events = self.take_pending();
        if since.is_none() && self.options.skip_initial_backlog {
            log::debug!(
                "matrix: discarding {} events from the initial sync",
                events.len()
            );
            return Ok(Vec::new());
        }
        Ok(events)
    }
}
