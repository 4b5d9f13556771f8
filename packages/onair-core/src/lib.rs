//! OnAir Core - shared library for the on-air push service.
//!
//! This crate tracks what a radio station is playing right now and pushes a
//! snapshot of it to every connected WebSocket client whenever it changes,
//! decorated with album or artist artwork from a metadata provider.
//!
//! # Architecture
//!
//! - [`playlist`]: Shows, spins and the on-now lookahead filter
//! - [`services`]: Now-state tracking, poll scheduling, the broadcast group
//!   and the artwork pre-fetch queue
//! - [`artwork`]: Artwork cache and per-broadcast resolution
//! - [`metadata`]: Metadata provider client (Discogs)
//! - [`control`]: Loopback UDP control channel
//! - [`proxy`]: Downstream WebSocket fan-out
//! - [`api`]: HTTP/WebSocket surface
//! - [`bootstrap`]: Composition root
//!
//! # Abstraction Traits
//!
//! - [`PlaylistSource`](playlist::PlaylistSource): where shows and spins come from
//! - [`ArtworkStore`](artwork::ArtworkStore): artwork cache
//! - [`MetadataProvider`](metadata::MetadataProvider): remote artwork lookups
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod artwork;
pub mod bootstrap;
pub mod control;
pub mod error;
pub mod metadata;
pub mod playlist;
pub mod protocol_constants;
pub mod proxy;
pub mod runtime;
pub mod services;
pub mod state;

// Re-export commonly used types at the crate root
pub use artwork::{ArtworkResolver, ArtworkStore, MemoryArtworkStore};
pub use control::{send_control, send_raw, ControlCommand, ControlError, ControlListener};
pub use error::{ErrorCode, OnAirError, OnAirResult};
pub use metadata::{DiscogsClient, DiscogsConfig, MetadataProvider, ProviderError};
pub use playlist::{MemoryPlaylistSource, PlaylistError, PlaylistSource};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use services::{ImageQueueHandle, NotifierHandle, NowSnapshot, SnapshotEvent};
pub use state::{Config, ProviderConfig};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{start_server, AppState, ServerError, WsConnectionManager};
