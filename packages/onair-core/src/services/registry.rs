//! Connected push clients.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

/// Identifies a connected client for the lifetime of its connection.
pub type ClientId = u64;

/// A serialized snapshot, shared between all recipients.
pub type Frame = Arc<str>;

/// Outbound half of a client connection.
pub type ClientSender = mpsc::UnboundedSender<Frame>;

/// The broadcast group.
///
/// Owned by the notifier; connection handlers only ever reach it through
/// [`NotifierHandle`](super::NotifierHandle). A client whose connection is
/// gone is dropped from the group on the first failed send.
#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientSender>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a client. Returns `true` if it is the only member now.
    pub fn add(&mut self, id: ClientId, sender: ClientSender) -> bool {
        self.clients.insert(id, sender);
        self.clients.len() == 1
    }

    /// Removes a client. Returns `true` if it was a member.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    #[must_use]
    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Iterates over member ids.
    pub fn each(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.keys().copied()
    }

    /// Sends a frame to one member. Returns `false` if it is not a member
    /// or its connection is gone, in which case it is removed.
    pub fn send_to(&mut self, id: ClientId, frame: &Frame) -> bool {
        let Some(sender) = self.clients.get(&id) else {
            return false;
        };
        if sender.send(Arc::clone(frame)).is_ok() {
            return true;
        }
        log::debug!("[Notifier] Client {} is gone, removing", id);
        self.clients.remove(&id);
        false
    }

    /// Sends a frame to every member. Returns how many received it.
    pub fn broadcast(&mut self, frame: &Frame) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|id, sender| match sender.send(Arc::clone(frame)) {
                Ok(()) => true,
                Err(_) => {
                    log::debug!("[Notifier] Client {} is gone, removing", id);
                    false
                }
            });
        let delivered = self.clients.len();
        if delivered < before {
            log::info!(
                "[Notifier] Dropped {} dead client(s) during broadcast",
                before - delivered
            );
        }
        delivered
    }
}
