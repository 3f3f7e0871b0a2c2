//! In-memory registry of connections that completed the INIT handshake.

use std::collections::HashMap;

use heartbeat_core::{ChannelId, ConnectionId, RegistryError};
use parking_lot::Mutex;

/// Maps a registered connection to the channel it registered on.
///
/// A single lock guards the map; every operation is O(1) and holds the lock
/// only for the map access itself.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, ChannelId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `connection -> channel`. Fails without touching the existing
    /// entry if the connection is already registered.
    pub fn register(&self, connection: ConnectionId, channel: ChannelId) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock();
        if let Some(existing) = sessions.get(&connection) {
            return Err(RegistryError::AlreadyRegistered {
                connection,
                channel: existing.clone(),
            });
        }
        let _ = sessions.insert(connection, channel);
        Ok(())
    }

    pub fn lookup(&self, connection: &ConnectionId) -> Option<ChannelId> {
        self.sessions.lock().get(connection).cloned()
    }

    pub fn contains(&self, connection: &ConnectionId) -> bool {
        self.sessions.lock().contains_key(connection)
    }

    /// Remove the entry for `connection`, returning the channel it held.
    pub fn remove(&self, connection: &ConnectionId) -> Result<ChannelId, RegistryError> {
        self.sessions
            .lock()
            .remove(connection)
            .ok_or_else(|| RegistryError::NotRegistered(connection.clone()))
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
