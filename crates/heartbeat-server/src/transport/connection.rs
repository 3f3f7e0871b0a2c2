//! Connection table: physical connections and the channels they own.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use heartbeat_core::{ChannelId, ConnectionId};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::frame::{EstablishedData, ServerFrame};
use super::{ChannelEvent, ChannelTransport};

/// A connected WebSocket client.
pub struct Connection {
    pub id: ConnectionId,
    pub control_channel: ChannelId,
    pub data_channel: ChannelId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    pub connected_at: Instant,
    /// When the last pong (or any inbound frame) was received.
    last_seen: Mutex<Instant>,
    dropped_frames: AtomicU64,
}

impl Connection {
    fn new(tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id: ConnectionId::new(),
            control_channel: ChannelId::new(),
            data_channel: ChannelId::new(),
            tx,
            connected_at: now,
            last_seen: Mutex::new(now),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Queue a raw text frame. Returns `false` and counts the drop if the
    /// queue is full or the writer is gone.
    pub fn send(&self, text: Arc<String>) -> bool {
        if self.tx.try_send(text).is_ok() {
            true
        } else {
            let dropped = self.dropped_frames.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(connection_id = %self.id, dropped, "send queue full or closed, dropping frame");
            false
        }
    }

    pub fn send_frame(&self, frame: &ServerFrame) -> bool {
        frame
            .to_json()
            .is_some_and(|json| self.send(Arc::new(json)))
    }

    pub fn established(&self) -> ServerFrame {
        ServerFrame::established(EstablishedData {
            connection_id: self.id.clone(),
            control_channel_id: self.control_channel.clone(),
            data_channel_id: self.data_channel.clone(),
        })
    }

    pub fn mark_alive(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

/// All open connections, indexed by connection id and by channel id.
pub struct ConnectionTable {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    channels: DashMap<ChannelId, ConnectionId>,
    max_send_queue: usize,
}

impl ConnectionTable {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            connections: DashMap::new(),
            channels: DashMap::new(),
            max_send_queue: max_send_queue.max(1),
        }
    }

    /// Allocate ids for a new connection and its two channels.
    pub fn open(&self) -> (Arc<Connection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let connection = Arc::new(Connection::new(tx));
        let _ = self
            .channels
            .insert(connection.control_channel.clone(), connection.id.clone());
        let _ = self
            .channels
            .insert(connection.data_channel.clone(), connection.id.clone());
        let _ = self
            .connections
            .insert(connection.id.clone(), Arc::clone(&connection));
        debug!(connection_id = %connection.id, "connection opened");
        (connection, rx)
    }

    /// Forget a connection and its channels. Returns `false` if it was
    /// already closed.
    pub fn close(&self, id: &ConnectionId) -> bool {
        let Some((_, connection)) = self.connections.remove(id) else {
            return false;
        };
        let _ = self.channels.remove(&connection.control_channel);
        let _ = self.channels.remove(&connection.data_channel);
        true
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|c| Arc::clone(c.value()))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl ChannelTransport for ConnectionTable {
    fn connection_of(&self, channel: &ChannelId) -> Option<ConnectionId> {
        self.channels.get(channel).map(|c| c.value().clone())
    }

    fn data_channel_of(&self, connection: &ConnectionId) -> Option<ChannelId> {
        self.connections
            .get(connection)
            .map(|c| c.data_channel.clone())
    }

    fn emit(&self, channel: &ChannelId, event: ChannelEvent) -> bool {
        let Some(connection) = self
            .connection_of(channel)
            .and_then(|id| self.get(&id))
        else {
            debug!(channel_id = %channel, "emit to closed channel ignored");
            return false;
        };
        connection.send_frame(&ServerFrame::from(event))
    }
}
