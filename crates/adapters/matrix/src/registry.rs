//! Room registry: Matrix room id <-> gateway channel name.
//!
//! Written on join, read on every inbound event and outbound send.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Maps {
    /// room_id -> channel (inbound routing)
    by_room: HashMap<String, String>,
    /// channel -> room_id (outbound delivery)
    by_channel: HashMap<String, String>,
}

/// Shared, cloneable mapping between room ids and channel names.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    inner: Arc<RwLock<Maps>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `room_id` to `channel`, replacing any previous channel for that room.
    pub async fn put(&self, room_id: impl Into<String>, channel: impl Into<String>) {
        let room_id = room_id.into();
        let channel = channel.into();
        let mut g = self.inner.write().await;
        if let Some(old_channel) = g.by_room.insert(room_id.clone(), channel.clone()) {
            if old_channel != channel && g.by_channel.get(&old_channel) == Some(&room_id) {
                g.by_channel.remove(&old_channel);
            }
        }
        g.by_channel.insert(channel, room_id);
    }

    /// Channel bridged to `room_id` (inbound).
    pub async fn channel_for_room(&self, room_id: &str) -> Option<String> {
        self.inner.read().await.by_room.get(room_id).cloned()
    }

    /// Room currently joined for `channel` (outbound).
    pub async fn room_for_channel(&self, channel: &str) -> Option<String> {
        self.inner.read().await.by_channel.get(channel).cloned()
    }

    /// Number of bridged rooms.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_room.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookups_both_directions() {
        let reg = RoomRegistry::new();
        reg.put("!abc:server", "#general").await;
        assert_eq!(reg.channel_for_room("!abc:server").await.as_deref(), Some("#general"));
        assert_eq!(reg.room_for_channel("#general").await.as_deref(), Some("!abc:server"));
        assert_eq!(reg.channel_for_room("!nope:server").await, None);
        assert_eq!(reg.room_for_channel("#nope").await, None);
    }

    #[tokio::test]
    async fn put_overwrites_room_and_drops_stale_reverse_entry() {
        let reg = RoomRegistry::new();
        reg.put("!abc:server", "#old").await;
        reg.put("!abc:server", "#new").await;
        assert_eq!(reg.channel_for_room("!abc:server").await.as_deref(), Some("#new"));
        assert_eq!(reg.room_for_channel("#new").await.as_deref(), Some("!abc:server"));
        assert_eq!(reg.room_for_channel("#old").await, None);
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn rejoin_moves_channel_to_new_room() {
        let reg = RoomRegistry::new();
        reg.put("!one:server", "#general").await;
        reg.put("!two:server", "#general").await;
        assert_eq!(reg.room_for_channel("#general").await.as_deref(), Some("!two:server"));
        // The older room still routes inbound to the channel until the process restarts.
        assert_eq!(reg.channel_for_room("!one:server").await.as_deref(), Some("#general"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_are_not_lost() {
        let reg = RoomRegistry::new();
        let mut tasks = Vec::new();
        for i in 0..64 {
            let reg = reg.clone();
            tasks.push(tokio::spawn(async move {
                reg.put(format!("!room{}:server", i), format!("#chan{}", i)).await;
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(reg.len().await, 64);
        for i in 0..64 {
            let room = format!("!room{}:server", i);
            let chan = format!("#chan{}", i);
            assert_eq!(reg.channel_for_room(&room).await.as_deref(), Some(chan.as_str()));
            assert_eq!(reg.room_for_channel(&chan).await.as_deref(), Some(room.as_str()));
        }
    }
}
