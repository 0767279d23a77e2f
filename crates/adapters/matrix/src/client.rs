//! Network capability the adapter drives: login, join, send, and sync.
//!
//! The wire protocol lives behind this trait; `SdkClient` (matrix-sdk) is the default
//! implementation and tests plug in an in-memory one.

use crate::error::MatrixError;
use async_trait::async_trait;

/// Authenticated session returned by login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Our own user id, used for echo suppression.
    pub user_id: String,
    pub access_token: String,
}

/// Kind of a room event, parsed once at the client boundary: the `msgtype` of an
/// `m.room.message`, or a redaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSubtype {
    Text,
    Notice,
    Emote,
    /// Anything else (images, files, custom types). Carries the raw msgtype.
    Other(String),
    /// `m.room.redaction` of the event `redacts`.
    Redaction { redacts: String },
}

impl MessageSubtype {
    pub fn from_msgtype(msgtype: &str) -> Self {
        match msgtype {
            "m.text" => MessageSubtype::Text,
            "m.notice" => MessageSubtype::Notice,
            "m.emote" => MessageSubtype::Emote,
            other => MessageSubtype::Other(other.to_string()),
        }
    }
}

/// A room message or redaction observed during sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub room_id: String,
    pub sender_id: String,
    pub subtype: MessageSubtype,
    pub body: String,
}

impl InboundEvent {
    pub fn new(
        room_id: impl Into<String>,
        sender_id: impl Into<String>,
        subtype: MessageSubtype,
        body: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            subtype,
            body: body.into(),
        }
    }
}

/// Matrix network operations. Implementations must be safe to call from the sync task and from senders concurrently.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Password login. On success the client keeps the access token for later calls.
    async fn authenticate(
        &self,
        server: &str,
        login: &str,
        password: &str,
    ) -> Result<Session, MatrixError>;

    /// Join a room by id or alias; returns the room id.
    async fn join_room(&self, room: &str) -> Result<String, MatrixError>;

    /// Send `m.text`. Ok once the homeserver accepted it.
    async fn send_text(&self, room_id: &str, text: &str) -> Result<(), MatrixError>;

    /// Send `m.emote`. Ok once the homeserver accepted it.
    async fn send_emote(&self, room_id: &str, text: &str) -> Result<(), MatrixError>;

    /// One sync cycle. Blocks until events arrive or the long-poll times out; returns events in timeline order.
    async fn sync(&self) -> Result<Vec<InboundEvent>, MatrixError>;
}
