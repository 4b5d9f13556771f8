//! WebSocket connection tracking and management.
//!
//! - `WsConnectionManager`: Tracks all active push connections
//! - `ConnectionGuard`: RAII guard that leaves the broadcast group on disconnect

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::services::{ClientId, NotifierHandle};

/// Per-connection bookkeeping.
struct ConnectionState {
    connected_at: Instant,
}

/// Manages all active push connections.
///
/// Uses hierarchical cancellation tokens for force-closing every
/// connection at once.
pub struct WsConnectionManager {
    connections: DashMap<ClientId, ConnectionState>,
    next_id: AtomicU64,
    /// Replaced after `close_all()` so new connections can still be accepted.
    global_cancel: RwLock<CancellationToken>,
    notifier: NotifierHandle,
}

impl WsConnectionManager {
    pub fn new(notifier: NotifierHandle) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            global_cancel: RwLock::new(CancellationToken::new()),
            notifier,
        }
    }

    /// Registers a new connection and returns a guard for RAII cleanup.
    ///
    /// The caller still has to join the client to the broadcast group; the
    /// guard only takes care of leaving it.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel_token = self.global_cancel.read().child_token();

        self.connections.insert(
            id,
            ConnectionState {
                connected_at: Instant::now(),
            },
        );
        log::info!(
            "[WS] Connection registered: ws-{} (total: {})",
            id,
            self.connections.len()
        );

        ConnectionGuard {
            id,
            manager: Arc::clone(self),
            cancel_token,
        }
    }

    fn unregister(&self, id: ClientId) {
        self.notifier.leave(id);
        if let Some((_, state)) = self.connections.remove(&id) {
            log::info!(
                "[WS] Connection unregistered: ws-{} after {:?} (remaining: {})",
                id,
                state.connected_at.elapsed(),
                self.connections.len()
            );
        }
    }

    /// Returns the number of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Force-closes all connections.
    ///
    /// Returns the number of connections that were signaled to close.
    pub fn close_all(&self) -> usize {
        let count = self.connections.len();
        if count > 0 {
            log::info!("[WS] Force-closing {} connection(s)", count);
            let mut guard = self.global_cancel.write();
            guard.cancel();
            *guard = CancellationToken::new();
        }
        count
    }
}

/// RAII guard that unregisters a connection when dropped.
pub struct ConnectionGuard {
    id: ClientId,
    manager: Arc<WsConnectionManager>,
    /// Cancelled on force-close.
    cancel_token: CancellationToken,
}

impl ConnectionGuard {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Use in `tokio::select!` to detect force-close requests.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.manager.unregister(self.id);
    }
}
