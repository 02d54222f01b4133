//! Session registry
//!
//! Maps live connections to user identities (`conn↔user`, single active
//! session per user, last writer wins) and to conversation rooms
//! (`room→conns`). All maps sit behind one lock so a fan-out snapshot is
//! never taken mid-mutation and a bind/unbind pair cannot interleave into
//! stale entries.
//!
//! Delivery is advisory: durable state is persisted before any notification
//! is attempted, so a frame dropped on a dead connection loses timeliness,
//! never data. Send failures are swallowed here and surface only as trace
//! output.

use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::conversation;
use crate::error::GatewayResult;
use crate::keys::{ConversationKey, UserKey};
use crate::protocol::{events, ServerEnvelope};

/// Process-local identifier of one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

/// Outbound channel of a connection; the writer task drains it into the
/// socket.
pub type Outbound = UnboundedSender<String>;

#[derive(Default)]
struct Inner {
    senders: HashMap<ConnId, Outbound>,
    conn_user: HashMap<ConnId, UserKey>,
    user_conn: HashMap<UserKey, ConnId>,
    rooms: HashMap<ConversationKey, HashSet<ConnId>>,
}

#[derive(Default)]
pub struct SessionRegistry {
    next_conn: AtomicU64,
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Held only for map operations; nothing inside blocks.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a freshly accepted connection and its outbound channel.
    pub fn register(&self, sender: Outbound) -> ConnId {
        let conn = ConnId(self.next_conn.fetch_add(1, Ordering::Relaxed));
        self.lock().senders.insert(conn, sender);
        conn
    }

    /// Bind an authenticated identity to a connection.
    ///
    /// Evicts any prior connection bound to the same user (that connection
    /// drops back to the unauthenticated state; its socket stays open) and
    /// any prior user bound to this connection.
    pub fn bind(&self, conn: ConnId, user: UserKey) {
        let mut inner = self.lock();
        if let Some(prev_conn) = inner.user_conn.insert(user, conn) {
            if prev_conn != conn {
                inner.conn_user.remove(&prev_conn);
            }
        }
        if let Some(prev_user) = inner.conn_user.insert(conn, user) {
            if prev_user != user && inner.user_conn.get(&prev_user) == Some(&conn) {
                inner.user_conn.remove(&prev_user);
            }
        }
    }

    /// Idempotent room membership add.
    pub fn join(&self, conn: ConnId, room: ConversationKey) {
        let mut inner = self.lock();
        if inner.senders.contains_key(&conn) {
            inner.rooms.entry(room).or_default().insert(conn);
        }
    }

    /// Remove a connection from every map.
    ///
    /// Returns the user key that was freed, or `None` when the connection
    /// never authenticated or was already evicted by a newer session (in
    /// which case the user is still online elsewhere and no offline
    /// presence should be broadcast).
    pub fn unbind(&self, conn: ConnId) -> Option<UserKey> {
        let mut inner = self.lock();
        inner.senders.remove(&conn);
        for members in inner.rooms.values_mut() {
            members.remove(&conn);
        }
        inner.rooms.retain(|_, members| !members.is_empty());

        let user = inner.conn_user.remove(&conn)?;
        if inner.user_conn.get(&user) == Some(&conn) {
            inner.user_conn.remove(&user);
            Some(user)
        } else {
            None
        }
    }

    /// Identity bound to a connection, if it has authenticated.
    pub fn user_of(&self, conn: ConnId) -> Option<UserKey> {
        self.lock().conn_user.get(&conn).copied()
    }

    /// Whether the user currently has an authenticated connection.
    pub fn is_online(&self, user: UserKey) -> bool {
        self.lock().user_conn.contains_key(&user)
    }

    /// Whether the user's bound connection has joined the room.
    pub fn is_in_room(&self, room: ConversationKey, user: UserKey) -> bool {
        let inner = self.lock();
        match inner.user_conn.get(&user) {
            Some(conn) => inner
                .rooms
                .get(&room)
                .is_some_and(|members| members.contains(conn)),
            None => false,
        }
    }

    fn send_frame(sender: &Outbound, frame: String) -> bool {
        // Best effort: a closed channel means the connection is on its way
        // out and will unbind itself.
        sender.send(frame).is_ok()
    }

    /// Best-effort single-recipient send. Failures are swallowed.
    pub fn deliver(
        &self,
        conn: ConnId,
        event: &str,
        data: Value,
        request_id: Option<&str>,
    ) -> bool {
        let frame = ServerEnvelope::new(event, data, request_id).to_json();
        let sender = self.lock().senders.get(&conn).cloned();
        match sender {
            Some(sender) => Self::send_frame(&sender, frame),
            None => false,
        }
    }

    /// Deliver to the user's currently bound connection, if any.
    pub fn deliver_user(&self, user: UserKey, event: &str, data: Value) -> bool {
        let sender = {
            let inner = self.lock();
            inner
                .user_conn
                .get(&user)
                .and_then(|conn| inner.senders.get(conn))
                .cloned()
        };
        match sender {
            Some(sender) => {
                Self::send_frame(&sender, ServerEnvelope::new(event, data, None).to_json())
            }
            None => false,
        }
    }

    /// Deliver to every connection joined to the room, except the excluded
    /// user's connection if any.
    pub fn broadcast_room(
        &self,
        room: ConversationKey,
        event: &str,
        data: Value,
        exclude: Option<UserKey>,
    ) {
        let frame = ServerEnvelope::new(event, data, None).to_json();
        let recipients: Vec<Outbound> = {
            let inner = self.lock();
            let excluded_conn = exclude.and_then(|user| inner.user_conn.get(&user).copied());
            inner
                .rooms
                .get(&room)
                .map(|members| {
                    members
                        .iter()
                        .filter(|&&conn| Some(conn) != excluded_conn)
                        .filter_map(|conn| inner.senders.get(conn).cloned())
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut dropped = 0usize;
        for sender in &recipients {
            if !Self::send_frame(sender, frame.clone()) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!(%room, dropped, "room broadcast hit closed connections");
        }
    }

    /// Deliver to every participant of the conversation with a bound
    /// connection, regardless of room membership.
    ///
    /// This is how users who have not opened a conversation still see live
    /// updates. Participants are read from the store; state was persisted
    /// before this is called.
    pub async fn notify_participants(
        &self,
        pool: &SqlitePool,
        conversation: ConversationKey,
        event: &str,
        data: Value,
        exclude: Option<UserKey>,
    ) -> GatewayResult<()> {
        let participants = conversation::participants_of(pool, conversation).await?;
        for user in participants {
            if Some(user) == exclude {
                continue;
            }
            self.deliver_user(user, event, data.clone());
        }
        Ok(())
    }

    /// Deliver a presence event to every authenticated connection.
    pub fn presence_broadcast(&self, user: UserKey, online: bool, last_seen: Option<i64>) {
        let data = serde_json::json!({
            "user_id": user,
            "online": online,
            "last_seen": last_seen,
        });
        let frame = ServerEnvelope::new(events::PRESENCE_UPDATE, data, None).to_json();
        let recipients: Vec<Outbound> = {
            let inner = self.lock();
            inner
                .conn_user
                .keys()
                .filter_map(|conn| inner.senders.get(conn).cloned())
                .collect()
        };
        for sender in &recipients {
            Self::send_frame(sender, frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn frame(raw: &str) -> serde_json::Value {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn test_bind_and_deliver() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = registry.register(tx);
        let user = UserKey::generate();
        registry.bind(conn, user);

        assert!(registry.is_online(user));
        assert!(registry.deliver(conn, "join_ok", serde_json::json!({}), Some("r1")));
        let received = frame(&rx.recv().await.unwrap());
        assert_eq!(received["type"], "join_ok");
        assert_eq!(received["request_id"], "r1");
    }

    #[tokio::test]
    async fn test_rebind_evicts_previous_connection() {
        let registry = SessionRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let old = registry.register(tx1);
        let new = registry.register(tx2);
        let user = UserKey::generate();

        registry.bind(old, user);
        registry.bind(new, user);

        // The old connection dropped back to unauthenticated; its later
        // disconnect must not report the user offline.
        assert_eq!(registry.unbind(old), None);
        assert!(registry.is_online(user));
        assert!(registry.deliver_user(user, "ping", serde_json::json!({})));
        assert_eq!(frame(&rx2.recv().await.unwrap())["type"], "ping");
    }

    #[tokio::test]
    async fn test_unbind_frees_user_and_rooms() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = registry.register(tx);
        let user = UserKey::generate();
        let room = ConversationKey::generate();

        registry.bind(conn, user);
        registry.join(conn, room);
        assert!(registry.is_in_room(room, user));

        assert_eq!(registry.unbind(conn), Some(user));
        assert!(!registry.is_online(user));
        assert!(!registry.is_in_room(room, user));
        // Idempotent second unbind.
        assert_eq!(registry.unbind(conn), None);
    }

    #[tokio::test]
    async fn test_deliver_to_closed_connection_is_swallowed() {
        let registry = SessionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = registry.register(tx);
        drop(rx);
        // Returns the internal signal but never errors.
        assert!(!registry.deliver(conn, "ping", serde_json::json!({}), None));
    }

    #[tokio::test]
    async fn test_broadcast_room_excludes_user() {
        let registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let conn_a = registry.register(tx_a);
        let conn_b = registry.register(tx_b);
        let (user_a, user_b) = (UserKey::generate(), UserKey::generate());
        registry.bind(conn_a, user_a);
        registry.bind(conn_b, user_b);

        let room = ConversationKey::generate();
        registry.join(conn_a, room);
        registry.join(conn_b, room);
        registry.join(conn_b, room); // idempotent

        registry.broadcast_room(room, "new_message", serde_json::json!({"n": 1}), Some(user_a));
        assert_eq!(frame(&rx_b.recv().await.unwrap())["data"]["n"], 1);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_presence_broadcast_reaches_authenticated_connections_only() {
        let registry = SessionRegistry::new();
        let (tx_authed, mut rx_authed) = mpsc::unbounded_channel();
        let (tx_anon, mut rx_anon) = mpsc::unbounded_channel();
        let conn_authed = registry.register(tx_authed);
        let _conn_anon = registry.register(tx_anon);
        registry.bind(conn_authed, UserKey::generate());

        let user = UserKey::generate();
        registry.presence_broadcast(user, true, None);

        let received = frame(&rx_authed.recv().await.unwrap());
        assert_eq!(received["type"], "presence_update");
        assert_eq!(received["data"]["online"], true);
        assert!(rx_anon.try_recv().is_err());
    }
}
