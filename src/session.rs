//! Device session registry.
//!
//! A session binds a transport-level peer to a resolved device identity and
//! remembers the last fully decoded record for carry-forward. Sessions are
//! keyed two ways: connection-oriented peers bind once at handshake and are
//! addressed by connection id afterwards; connectionless peers re-declare
//! their identity on every datagram and are addressed by it.
//!
//! The registry is shared across all connection tasks. The map locks per
//! shard-key, so operations on different sessions never block each other;
//! `update` is the only mutation path into a session's decoded state.

use crate::inventory::DeviceInventory;
use crate::types::Record;
use crate::{ProtocolError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Opaque id for one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate a process-unique connection id.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a session is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Connection(ConnectionId),
    Identity(String),
}

/// Snapshot of one device session.
///
/// Handed to the decode path by value so no map lock is held across awaits.
#[derive(Debug, Clone)]
pub struct Session {
    pub key: SessionKey,
    pub device_id: u64,
    pub identity: String,
    pub last_record: Option<Record>,
}

#[derive(Debug)]
struct SessionState {
    device_id: u64,
    identity: String,
    last_record: Option<Record>,
    last_seen: Instant,
}

/// Process-wide registry of live sessions.
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, SessionState>,
    inventory: Arc<dyn DeviceInventory>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(inventory: Arc<dyn DeviceInventory>, idle_timeout: Duration) -> Self {
        Self { sessions: DashMap::new(), inventory, idle_timeout }
    }

    fn snapshot(&self, key: &SessionKey, state: &SessionState) -> Session {
        Session {
            key: key.clone(),
            device_id: state.device_id,
            identity: state.identity.clone(),
            last_record: state.last_record.clone(),
        }
    }

    /// Bind a connection to a declared identity during the handshake.
    ///
    /// A connection that is already bound keeps its original binding; the
    /// re-declared identity is not consulted again. Fails with
    /// [`ProtocolError::UnknownDevice`] when the inventory does not know the
    /// identity.
    pub async fn bind_connection(
        &self,
        connection: ConnectionId,
        identity: &str,
    ) -> Result<Session> {
        let key = SessionKey::Connection(connection);
        if let Some(existing) = self.sessions.get(&key) {
            return Ok(self.snapshot(&key, &existing));
        }

        let device_id = self
            .inventory
            .lookup(identity)
            .await
            .ok_or_else(|| ProtocolError::unknown_device(identity))?;

        info!(connection = %connection, identity, device_id, "Session bound");
        let state = SessionState {
            device_id,
            identity: identity.to_string(),
            last_record: None,
            last_seen: Instant::now(),
        };
        let session = self.snapshot(&key, &state);
        self.sessions.insert(key, state);
        Ok(session)
    }

    /// Resolve the session bound to a connection, for data frames that do
    /// not re-declare an identity.
    pub fn connection_session(&self, connection: ConnectionId) -> Result<Session> {
        let key = SessionKey::Connection(connection);
        match self.sessions.get_mut(&key) {
            Some(mut state) => {
                state.last_seen = Instant::now();
                Ok(self.snapshot(&key, &state))
            }
            None => Err(ProtocolError::unknown_device("unidentified connection")),
        }
    }

    /// Resolve (or lazily create) the session for a datagram-declared
    /// identity.
    pub async fn resolve_datagram(&self, identity: &str) -> Result<Session> {
        let key = SessionKey::Identity(identity.to_string());
        if let Some(mut state) = self.sessions.get_mut(&key) {
            state.last_seen = Instant::now();
            return Ok(self.snapshot(&key, &state));
        }

        let device_id = self
            .inventory
            .lookup(identity)
            .await
            .ok_or_else(|| ProtocolError::unknown_device(identity))?;

        debug!(identity, device_id, "Datagram session created");
        let state = SessionState {
            device_id,
            identity: identity.to_string(),
            last_record: None,
            last_seen: Instant::now(),
        };
        let session = self.snapshot(&key, &state);
        self.sessions.insert(key, state);
        Ok(session)
    }

    /// Overwrite a session's last decoded record. The only mutation path
    /// into session state after binding.
    pub fn update(&self, key: &SessionKey, record: &Record) {
        if let Some(mut state) = self.sessions.get_mut(key) {
            state.last_record = Some(record.clone());
            state.last_seen = Instant::now();
        }
    }

    /// Discard a connection's session on disconnect.
    pub fn remove_connection(&self, connection: ConnectionId) {
        if self.sessions.remove(&SessionKey::Connection(connection)).is_some() {
            debug!(connection = %connection, "Session discarded");
        }
    }

    /// Evict identity-keyed sessions with no traffic inside the idle window.
    ///
    /// Connection-keyed sessions are not swept; they die with their
    /// connection.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        let idle_timeout = self.idle_timeout;
        self.sessions.retain(|key, state| match key {
            SessionKey::Connection(_) => true,
            SessionKey::Identity(_) => state.last_seen.elapsed() < idle_timeout,
        });
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, "Idle sessions evicted");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::MemoryInventory;

    fn registry_with(identities: &[&str]) -> (SessionRegistry, Arc<MemoryInventory>) {
        let inventory = Arc::new(MemoryInventory::new());
        for identity in identities {
            inventory.register(*identity);
        }
        (SessionRegistry::new(inventory.clone(), Duration::from_secs(300)), inventory)
    }

    #[tokio::test]
    async fn unknown_identity_fails_binding() {
        let (registry, _) = registry_with(&[]);
        let result = registry.bind_connection(ConnectionId::next(), "356307042441013").await;
        assert!(matches!(result, Err(ProtocolError::UnknownDevice { .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn rebinding_returns_the_original_session() {
        let (registry, _) = registry_with(&["356307042441013", "111111111111111"]);
        let connection = ConnectionId::next();

        let first = registry.bind_connection(connection, "356307042441013").await.unwrap();
        // Second handshake on the same connection declares a different
        // identity; the original binding wins.
        let second = registry.bind_connection(connection, "111111111111111").await.unwrap();

        assert_eq!(second.device_id, first.device_id);
        assert_eq!(second.identity, "356307042441013");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn data_frames_require_a_bound_connection() {
        let (registry, _) = registry_with(&["356307042441013"]);
        let connection = ConnectionId::next();

        assert!(registry.connection_session(connection).is_err());

        registry.bind_connection(connection, "356307042441013").await.unwrap();
        let session = registry.connection_session(connection).unwrap();
        assert_eq!(session.identity, "356307042441013");
    }

    #[tokio::test]
    async fn update_is_visible_to_the_next_resolve() {
        let (registry, _) = registry_with(&["356307042441013"]);
        let session = registry.resolve_datagram("356307042441013").await.unwrap();
        assert!(session.last_record.is_none());

        let mut record = Record::new(session.device_id);
        record.valid = true;
        record.latitude = 3.067783;
        registry.update(&session.key, &record);

        let session = registry.resolve_datagram("356307042441013").await.unwrap();
        let last = session.last_record.expect("last record should be stored");
        assert_eq!(last.latitude, 3.067783);
    }

    #[tokio::test]
    async fn disconnect_discards_only_that_connection() {
        let (registry, _) = registry_with(&["356307042441013", "111111111111111"]);
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        registry.bind_connection(a, "356307042441013").await.unwrap();
        registry.bind_connection(b, "111111111111111").await.unwrap();

        registry.remove_connection(a);
        assert!(registry.connection_session(a).is_err());
        assert!(registry.connection_session(b).is_ok());
    }

    #[tokio::test]
    async fn idle_eviction_spares_connection_sessions() {
        let inventory = Arc::new(MemoryInventory::new());
        inventory.register("356307042441013");
        inventory.register("111111111111111");
        let registry = SessionRegistry::new(inventory, Duration::from_millis(0));

        let connection = ConnectionId::next();
        registry.bind_connection(connection, "356307042441013").await.unwrap();
        registry.resolve_datagram("111111111111111").await.unwrap();

        let evicted = registry.evict_idle();
        assert_eq!(evicted, 1);
        assert!(registry.connection_session(connection).is_ok());
    }
}
