//! Gateway-neutral message envelope passed between adapters over the bus.

use serde::{Deserialize, Serialize};

/// What a gateway message represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Plain chat message (text or notice on the origin network).
    #[default]
    Normal,
    /// "/me" style action.
    UserAction,
    /// Deletion of an earlier message. Adapters classify it but may not propagate it.
    MessageDelete,
}

/// A message on the gateway bus. Built by an adapter on inbound, or by the hub on outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayMessage {
    pub username: String,
    pub text: String,
    /// Gateway-facing channel name (as configured by the operator).
    pub channel: String,
    /// Adapter instance that produced the message.
    pub account: String,
    /// Network-native sender id (e.g. "@alice:example.org").
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub event: EventKind,
}

impl GatewayMessage {
    pub fn new(
        username: impl Into<String>,
        text: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            text: text.into(),
            channel: channel.into(),
            account: String::new(),
            user_id: String::new(),
            event: EventKind::Normal,
        }
    }

    pub fn action(
        username: impl Into<String>,
        text: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            event: EventKind::UserAction,
            ..Self::new(username, text, channel)
        }
    }

    pub fn delete(channel: impl Into<String>) -> Self {
        Self {
            event: EventKind::MessageDelete,
            ..Self::new("", "", channel)
        }
    }

    /// Set the originating account and network sender id.
    pub fn from_account(mut self, account: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.account = account.into();
        self.user_id = user_id.into();
        self
    }

    pub fn is_delete(&self) -> bool {
        self.event == EventKind::MessageDelete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_event_kind() {
        assert_eq!(GatewayMessage::new("a", "b", "#c").event, EventKind::Normal);
        assert_eq!(
            GatewayMessage::action("a", "waves", "#c").event,
            EventKind::UserAction
        );
        assert!(GatewayMessage::delete("#c").is_delete());
    }

    #[test]
    fn json_uses_gateway_field_names() {
        let msg = GatewayMessage::action("carol", "waves", "#general")
            .from_account("matrix.home", "@carol:server");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["userID"], "@carol:server");
        assert_eq!(v["account"], "matrix.home");
        assert_eq!(v["event"], "user_action");
    }

    #[test]
    fn missing_event_defaults_to_normal() {
        let msg: GatewayMessage = serde_json::from_str(
            r##"{"username":"bob","text":"hi","channel":"#x","account":"","userID":""}"##,
        )
        .unwrap();
        assert_eq!(msg.event, EventKind::Normal);
    }
}
