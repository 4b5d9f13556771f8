//! Task spawning abstraction.
//!
//! Actors hand blocking-ish work (playlist polls, artwork augmentation) to a
//! [`TaskSpawner`] and get the result back as a message, so their loops never
//! wait on I/O. Everything in this crate runs on Tokio; the trait keeps the
//! actors from reaching for the ambient runtime themselves.

use std::future::Future;

/// Abstraction for spawning background tasks.
///
/// Spawned tasks are detached: there is no join or cancel handle, so
/// results must travel back over a channel.
pub trait TaskSpawner: Send + Sync {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Spawner bound to a specific Tokio runtime.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Binds to the runtime the caller is running on.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
        }
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}
