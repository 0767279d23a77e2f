//! Matrix event <-> gateway message translation. Pure functions, no I/O.

use crate::client::{InboundEvent, MessageSubtype};
use lib::{EventKind, GatewayMessage};

/// What to do on the network for one outbound gateway message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Nothing to send (deletes are not propagated).
    Noop,
    Text { room_id: String, body: String },
    Emote { room_id: String, body: String },
}

/// Strip the "@" sigil and, when `strip_suffix` is set, the ":homeserver" part.
pub fn normalize_sender(sender_id: &str, strip_suffix: bool) -> String {
    let name = sender_id.strip_prefix('@').unwrap_or(sender_id);
    if strip_suffix {
        match name.split_once(':') {
            Some((local, _)) => local.to_string(),
            None => name.to_string(),
        }
    } else {
        name.to_string()
    }
}

/// Gateway event kind for an inbound event; None for unsupported msgtypes.
pub fn classify(event: &InboundEvent) -> Option<EventKind> {
    match event.subtype {
        MessageSubtype::Text | MessageSubtype::Notice => Some(EventKind::Normal),
        MessageSubtype::Emote => Some(EventKind::UserAction),
        MessageSubtype::Redaction { .. } => Some(EventKind::MessageDelete),
        MessageSubtype::Other(_) => None,
    }
}

/// Translate an inbound event. Returns None for our own echoes, for unsupported msgtypes,
/// and for deletions, which are recognized but not forwarded.
///
/// The returned message has no channel or account yet; the sync loop fills them in after
/// resolving the room.
pub fn from_network_event(
    event: &InboundEvent,
    self_id: &str,
    strip_suffix: bool,
) -> Option<GatewayMessage> {
    if event.sender_id == self_id {
        return None;
    }
    let kind = classify(event)?;
    if kind == EventKind::MessageDelete {
        log::debug!(
            "matrix: not forwarding deletion by {} in {}",
            event.sender_id,
            event.room_id
        );
        return None;
    }
    Some(GatewayMessage {
        username: normalize_sender(&event.sender_id, strip_suffix),
        text: event.body.clone(),
        channel: String::new(),
        account: String::new(),
        user_id: event.sender_id.clone(),
        event: kind,
    })
}

/// Translate an outbound message for `room_id`. The body is username immediately followed by text.
pub fn to_network_send(msg: &GatewayMessage, room_id: &str) -> Outbound {
    let body = format!("{}{}", msg.username, msg.text);
    match msg.event {
        EventKind::MessageDelete => Outbound::Noop,
        EventKind::UserAction => Outbound::Emote {
            room_id: room_id.to_string(),
            body,
        },
        EventKind::Normal => Outbound::Text {
            room_id: room_id.to_string(),
            body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELF_ID: &str = "@bridge:server";

    fn event(sender: &str, subtype: MessageSubtype) -> InboundEvent {
        InboundEvent::new("!abc:server", sender, subtype, "hello")
    }

    #[test]
    fn normalize_strips_sigil_and_optionally_suffix() {
        assert_eq!(normalize_sender("@alice:example.org", true), "alice");
        assert_eq!(normalize_sender("@alice:example.org", false), "alice:example.org");
        assert_eq!(normalize_sender("@alice", true), "alice");
        assert_eq!(normalize_sender("@a:b:c", true), "a");
    }

    #[test]
    fn own_events_are_skipped_for_every_subtype() {
        for subtype in [
            MessageSubtype::Text,
            MessageSubtype::Notice,
            MessageSubtype::Emote,
            MessageSubtype::Other("m.image".into()),
        ] {
            assert_eq!(from_network_event(&event(SELF_ID, subtype), SELF_ID, true), None);
        }
    }

    #[test]
    fn subtype_classification() {
        let text = from_network_event(&event("@carol:server", MessageSubtype::Text), SELF_ID, true);
        assert_eq!(text.map(|m| m.event), Some(EventKind::Normal));
        let notice =
            from_network_event(&event("@carol:server", MessageSubtype::Notice), SELF_ID, true);
        assert_eq!(notice.map(|m| m.event), Some(EventKind::Normal));
        let emote = from_network_event(&event("@carol:server", MessageSubtype::Emote), SELF_ID, true);
        assert_eq!(emote.map(|m| m.event), Some(EventKind::UserAction));
        let other = from_network_event(
            &event("@carol:server", MessageSubtype::Other("m.file".into())),
            SELF_ID,
            true,
        );
        assert_eq!(other, None);
    }

    #[test]
    fn redaction_is_classified_as_delete_but_not_forwarded() {
        let ev = event(
            "@carol:server",
            MessageSubtype::Redaction {
                redacts: "$abc:server".into(),
            },
        );
        assert_eq!(classify(&ev), Some(EventKind::MessageDelete));
        assert_eq!(from_network_event(&ev, SELF_ID, true), None);
        assert_eq!(classify(&event("@carol:server", MessageSubtype::Other("m.file".into()))), None);
    }

    #[test]
    fn inbound_fields() {
        let msg = from_network_event(&event("@carol:server", MessageSubtype::Text), SELF_ID, false)
            .unwrap();
        assert_eq!(msg.username, "carol:server");
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.user_id, "@carol:server");
    }

    #[test]
    fn outbound_text_has_no_separator() {
        let msg = GatewayMessage::new("bob", "hi", "#general");
        assert_eq!(
            to_network_send(&msg, "!abc:server"),
            Outbound::Text {
                room_id: "!abc:server".into(),
                body: "bobhi".into()
            }
        );
    }

    #[test]
    fn outbound_action_is_emote() {
        let msg = GatewayMessage::action("bob", " waves", "#general");
        assert_eq!(
            to_network_send(&msg, "!abc:server"),
            Outbound::Emote {
                room_id: "!abc:server".into(),
                body: "bob waves".into()
            }
        );
    }

    #[test]
    fn outbound_delete_is_noop() {
        assert_eq!(
            to_network_send(&GatewayMessage::delete("#general"), "!abc:server"),
            Outbound::Noop
        );
    }
}
