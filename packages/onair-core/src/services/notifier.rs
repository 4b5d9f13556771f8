//! The push notifier actor.
//!
//! [`Notifier`] is the single owner of the broadcast group, the last
//! delivered frame, the change tracker and the poll timer. Connection
//! handlers and the control listener talk to it through a cheap-to-clone
//! [`NotifierHandle`].
//!
//! Polls run off the actor loop: the tracker is moved into a spawned task
//! and handed back with the result, so at most one poll is ever in flight
//! and a slow playlist source or provider never blocks joins and leaves.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::now_state::{NowSnapshot, NowStateTracker, PollOutcome};
use super::registry::{ClientId, ClientRegistry, ClientSender, Frame};
use super::scheduler::Scheduler;
use crate::artwork::ArtworkResolver;
use crate::error::ErrorCode;
use crate::playlist::PlaylistResult;
use crate::protocol_constants::MIRROR_CHANNEL_CAPACITY;
use crate::runtime::{TaskSpawner, TokioSpawner};

/// Commands accepted by the [`Notifier`].
#[derive(Debug)]
pub enum NotifierCommand {
    /// A client connected.
    Join { id: ClientId, sender: ClientSender },
    /// A client disconnected.
    Leave { id: ClientId },
    /// Poll now and broadcast if the on-air state changed.
    Poll,
    /// Broadcast an externally built snapshot as-is (after artwork).
    Publish { snapshot: Box<NowSnapshot> },
    /// Reports the number of connected clients.
    ClientCount { respond_to: oneshot::Sender<usize> },
}

/// Work finished off the actor loop.
enum Completion {
    Polled {
        tracker: NowStateTracker,
        result: PlaylistResult<(PollOutcome, Option<Frame>)>,
    },
    Published {
        frame: Frame,
    },
}

/// One turn of the actor loop.
enum Step {
    Command(NotifierCommand),
    Completed(Completion),
    TimerFired,
    Shutdown,
}

/// Renders a snapshot into the frame sent to clients.
async fn render(resolver: &ArtworkResolver, mut snapshot: NowSnapshot) -> Frame {
    resolver.augment(&mut snapshot).await;
    Frame::from(snapshot.to_json())
}

/// The notifier actor.
pub struct Notifier {
    receiver: mpsc::UnboundedReceiver<NotifierCommand>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    registry: ClientRegistry,
    scheduler: Scheduler,
    /// `None` while a poll is in flight.
    tracker: Option<NowStateTracker>,
    resolver: Arc<ArtworkResolver>,
    spawner: TokioSpawner,
    /// Last frame delivered to the group, handed to late joiners.
    current: Option<Frame>,
    /// Clients that joined before any frame existed for them.
    awaiting_initial: Vec<ClientId>,
    next_event: Option<DateTime<Utc>>,
    /// Another poll was requested while one was in flight.
    poll_pending: bool,
    /// Group broadcasts are mirrored here for proxy connections.
    mirror: broadcast::Sender<Frame>,
    cancel: CancellationToken,
}

impl Notifier {
    /// Creates the actor and its handle.
    pub fn new(
        tracker: NowStateTracker,
        resolver: Arc<ArtworkResolver>,
        spawner: TokioSpawner,
        cancel: CancellationToken,
    ) -> (Self, NotifierHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (mirror, _) = broadcast::channel(MIRROR_CHANNEL_CAPACITY);

        let handle = NotifierHandle {
            sender,
            mirror: mirror.clone(),
        };
        let notifier = Self {
            receiver,
            completions_tx,
            completions_rx,
            registry: ClientRegistry::new(),
            scheduler: Scheduler::new(),
            tracker: Some(tracker),
            resolver,
            spawner,
            current: None,
            awaiting_initial: Vec::new(),
            next_event: None,
            poll_pending: false,
            mirror,
            cancel,
        };
        (notifier, handle)
    }

    /// Runs the actor loop until cancelled or every handle is dropped.
    pub async fn run(mut self) {
        log::info!("[Notifier] Started");
        let cancel = self.cancel.clone();

        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Shutdown,
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Step::Command(cmd),
                    None => Step::Shutdown,
                },
                Some(done) = self.completions_rx.recv() => Step::Completed(done),
                _ = self.scheduler.fired(), if self.scheduler.is_armed() => Step::TimerFired,
            };

            match step {
                Step::Command(cmd) => self.handle_command(cmd),
                Step::Completed(done) => self.handle_completion(done),
                Step::TimerFired => self.request_poll(false),
                Step::Shutdown => break,
            }
        }

        log::info!(
            "[Notifier] Stopped ({} client(s) connected)",
            self.registry.len()
        );
    }

    fn handle_command(&mut self, cmd: NotifierCommand) {
        match cmd {
            NotifierCommand::Join { id, sender } => self.on_join(id, sender),
            NotifierCommand::Leave { id } => self.on_leave(id),
            NotifierCommand::Poll => {
                log::debug!("[Notifier] Poll requested");
                self.request_poll(false);
            }
            NotifierCommand::Publish { snapshot } => self.publish(*snapshot),
            NotifierCommand::ClientCount { respond_to } => {
                let _ = respond_to.send(self.registry.len());
            }
        }
    }

    fn on_join(&mut self, id: ClientId, sender: ClientSender) {
        let first = self.registry.add(id, sender);
        log::info!(
            "[Notifier] Client {} joined ({} connected)",
            id,
            self.registry.len()
        );

        if first {
            // Coming out of idle: the last frame may be stale, so poll afresh.
            self.awaiting_initial.push(id);
            self.request_poll(true);
            return;
        }

        match self.current.clone() {
            Some(frame) => {
                self.registry.send_to(id, &frame);
            }
            None => self.awaiting_initial.push(id),
        }
    }

    fn on_leave(&mut self, id: ClientId) {
        if !self.registry.remove(id) {
            return;
        }
        self.awaiting_initial.retain(|pending| *pending != id);
        log::info!(
            "[Notifier] Client {} left ({} connected)",
            id,
            self.registry.len()
        );
        self.idle_if_empty();
    }

    fn idle_if_empty(&mut self) {
        if self.registry.is_empty() && self.scheduler.cancel() {
            log::info!("[Notifier] No clients connected, polling stopped");
        }
    }

    /// Starts a poll, or queues one if a poll is already in flight.
    ///
    /// A forced poll renders a frame even if nothing changed, for clients
    /// still waiting on their first message.
    fn request_poll(&mut self, force: bool) {
        let Some(mut tracker) = self.tracker.take() else {
            self.poll_pending = true;
            return;
        };
        let force = force || !self.awaiting_initial.is_empty();
        let resolver = Arc::clone(&self.resolver);
        let done = self.completions_tx.clone();

        self.spawner.spawn(async move {
            let result = match tracker.poll().await {
                Ok(outcome) => {
                    let frame = if outcome.changed || force {
                        Some(render(&resolver, outcome.snapshot.clone()).await)
                    } else {
                        None
                    };
                    Ok((outcome, frame))
                }
                Err(e) => Err(e),
            };
            let _ = done.send(Completion::Polled { tracker, result });
        });
    }

    fn publish(&mut self, snapshot: NowSnapshot) {
        let resolver = Arc::clone(&self.resolver);
        let done = self.completions_tx.clone();
        self.spawner.spawn(async move {
            let frame = render(&resolver, snapshot).await;
            let _ = done.send(Completion::Published { frame });
        });
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Polled { tracker, result } => self.on_polled(tracker, result),
            Completion::Published { frame } => {
                let delivered = self.broadcast(&frame);
                log::info!("[Notifier] Published snapshot to {} client(s)", delivered);
                self.current = Some(frame);
                self.idle_if_empty();
            }
        }
    }

    fn on_polled(
        &mut self,
        tracker: NowStateTracker,
        result: PlaylistResult<(PollOutcome, Option<Frame>)>,
    ) {
        self.tracker = Some(tracker);

        let polled = match result {
            Ok((outcome, frame)) => {
                self.next_event = outcome.next_event;
                if let Some(frame) = frame {
                    self.deliver(outcome.changed, frame);
                }
                true
            }
            Err(e) => {
                log::warn!("[Notifier] Poll failed ({}): {}", e.code(), e);
                false
            }
        };

        if std::mem::take(&mut self.poll_pending) || (polled && !self.awaiting_initial.is_empty())
        {
            self.request_poll(false);
            return;
        }

        if self.registry.is_empty() {
            self.idle_if_empty();
        } else {
            let delay = self.scheduler.arm(self.next_event, Utc::now());
            log::debug!("[Notifier] Next poll in {:?}", delay);
        }
    }

    fn deliver(&mut self, changed: bool, frame: Frame) {
        let awaiting = std::mem::take(&mut self.awaiting_initial);
        if changed {
            let delivered = self.broadcast(&frame);
            log::info!("[Notifier] On-air change sent to {} client(s)", delivered);
        } else {
            for id in awaiting {
                self.registry.send_to(id, &frame);
            }
        }
        self.current = Some(frame);
    }

    fn broadcast(&mut self, frame: &Frame) -> usize {
        // No receivers just means no proxy is configured or connected.
        let _ = self.mirror.send(Arc::clone(frame));
        self.registry.broadcast(frame)
    }
}

/// Handle for talking to the [`Notifier`].
///
/// Sends never block, so they are safe from `Drop` impls.
#[derive(Clone)]
pub struct NotifierHandle {
    sender: mpsc::UnboundedSender<NotifierCommand>,
    mirror: broadcast::Sender<Frame>,
}

impl NotifierHandle {
    fn send(&self, cmd: NotifierCommand) {
        if self.sender.send(cmd).is_err() {
            log::debug!("[Notifier] Command dropped, notifier has stopped");
        }
    }

    /// Adds a client to the broadcast group.
    pub fn join(&self, id: ClientId, sender: ClientSender) {
        self.send(NotifierCommand::Join { id, sender });
    }

    /// Removes a client from the broadcast group.
    pub fn leave(&self, id: ClientId) {
        self.send(NotifierCommand::Leave { id });
    }

    /// Forces an immediate poll. Clients hear about it only on change.
    pub fn poll(&self) {
        self.send(NotifierCommand::Poll);
    }

    /// Broadcasts a pre-built snapshot to every client.
    pub fn publish(&self, snapshot: NowSnapshot) {
        self.send(NotifierCommand::Publish {
            snapshot: Box::new(snapshot),
        });
    }

    /// Returns the number of connected clients, or 0 if the notifier stopped.
    pub async fn client_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(NotifierCommand::ClientCount { respond_to: tx });
        rx.await.unwrap_or(0)
    }

    /// Subscribes to every frame broadcast to the group.
    pub fn subscribe_mirror(&self) -> broadcast::Receiver<Frame> {
        self.mirror.subscribe()
    }
}
