//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. Actors are built here but
//! only start running when [`BootstrappedServices::start_background_tasks`]
//! is called.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::api::{AppState, WsConnectionManager};
use crate::artwork::{ArtworkResolver, ArtworkStore, MemoryArtworkStore};
use crate::control::ControlListener;
use crate::error::{OnAirError, OnAirResult};
use crate::metadata::{DiscogsClient, MetadataProvider};
use crate::playlist::{MemoryPlaylistSource, PlaylistSource};
use crate::proxy::run_proxy;
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::{ImageQueue, ImageQueueHandle, Notifier, NotifierHandle, NowStateTracker};
use crate::state::{Config, ProviderConfig};

/// Actors waiting to be started.
struct PendingActors {
    notifier: Notifier,
    image_queue: ImageQueue,
    control: ControlListener,
}

/// Container for all bootstrapped services.
pub struct BootstrappedServices {
    /// The in-memory playlist backing the tracker.
    pub playlist: Arc<MemoryPlaylistSource>,
    /// Artwork cache shared by the resolver, the image queue and the API.
    pub store: Arc<dyn ArtworkStore>,
    /// Handle to the broadcast group.
    pub notifier: NotifierHandle,
    /// Handle to the artwork pre-fetch worker.
    pub images: ImageQueueHandle,
    /// Manages WebSocket connections.
    pub ws_manager: Arc<WsConnectionManager>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    control_addr: SocketAddr,
    proxies: Vec<String>,
    actors: Mutex<Option<PendingActors>>,
}

impl BootstrappedServices {
    /// Where the control listener is bound.
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// State for the HTTP/WS router.
    pub fn app_state(&self) -> AppState {
        AppState {
            notifier: self.notifier.clone(),
            store: Arc::clone(&self.store),
            ws_manager: Arc::clone(&self.ws_manager),
        }
    }

    /// Spawns the notifier, image queue, control listener and proxy tasks.
    ///
    /// Returns `false` if they were already started.
    pub fn start_background_tasks(&self) -> bool {
        let Some(actors) = self.actors.lock().take() else {
            return false;
        };

        self.spawner.spawn(actors.notifier.run());
        self.spawner
            .spawn(actors.image_queue.run(self.cancel_token.clone()));
        self.spawner.spawn(actors.control.run(
            self.notifier.clone(),
            self.images.clone(),
            self.cancel_token.clone(),
        ));

        for url in &self.proxies {
            self.spawner.spawn(run_proxy(
                url.clone(),
                self.notifier.subscribe_mirror(),
                self.cancel_token.clone(),
            ));
        }

        log::info!(
            "[Bootstrap] Background tasks started ({} proxy/proxies)",
            self.proxies.len()
        );
        true
    }

    /// Initiates graceful shutdown of all services.
    pub fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.cancel_token.cancel();

        let closed = self.ws_manager.close_all();
        if closed > 0 {
            log::info!("[Bootstrap] Closed {} WebSocket connection(s)", closed);
        }
    }
}

/// Creates the shared HTTP client for provider calls.
fn create_http_client(provider: &ProviderConfig) -> OnAirResult<Client> {
    Client::builder()
        .timeout(provider.timeout())
        .build()
        .map_err(|e| OnAirError::Internal(format!("Failed to create HTTP client: {}", e)))
}

fn create_provider(config: &Config) -> OnAirResult<Option<Arc<dyn MetadataProvider>>> {
    let Some(provider) = &config.provider else {
        log::info!("[Bootstrap] No metadata provider configured, artwork disabled");
        return Ok(None);
    };
    let client = create_http_client(provider)?;
    log::info!("[Bootstrap] Metadata provider at {}", provider.base_url);
    Ok(Some(Arc::new(DiscogsClient::new(client, provider.discogs()))))
}

/// Bootstraps all application services with their dependencies.
///
/// Services are created in dependency order:
///
/// 1. Collaborators (playlist source, artwork store, metadata provider)
/// 2. Artwork resolver and now-state tracker
/// 3. Notifier and image queue actors
/// 4. Control listener (binds its socket here so bind errors surface early)
///
/// Must be called from within a Tokio runtime.
pub fn bootstrap_services(config: &Config) -> OnAirResult<BootstrappedServices> {
    config.validate().map_err(OnAirError::Configuration)?;

    let spawner = TokioSpawner::current();
    let cancel_token = CancellationToken::new();

    let playlist = Arc::new(match &config.playlist_file {
        Some(path) => MemoryPlaylistSource::from_yaml_file(path)?,
        None => MemoryPlaylistSource::new(),
    });
    let store: Arc<dyn ArtworkStore> = match &config.data_dir {
        Some(dir) => Arc::new(MemoryArtworkStore::open(dir)),
        None => Arc::new(MemoryArtworkStore::new()),
    };
    let provider = create_provider(config)?;

    let resolver = Arc::new(ArtworkResolver::new(Arc::clone(&store), provider.clone()));
    let tracker = NowStateTracker::new(Arc::clone(&playlist) as Arc<dyn PlaylistSource>);

    let (notifier, notifier_handle) =
        Notifier::new(tracker, resolver, spawner.clone(), cancel_token.clone());
    let (image_queue, images) = ImageQueue::new(
        Arc::clone(&playlist) as Arc<dyn PlaylistSource>,
        Arc::clone(&store),
        provider,
        config.image_queue_delay(),
    );

    let control = ControlListener::bind(config.control_port)?;
    let control_addr = control.local_addr()?;

    let ws_manager = Arc::new(WsConnectionManager::new(notifier_handle.clone()));

    Ok(BootstrappedServices {
        playlist,
        store,
        notifier: notifier_handle,
        images,
        ws_manager,
        spawner,
        cancel_token,
        control_addr,
        proxies: config.proxies.clone(),
        actors: Mutex::new(Some(PendingActors {
            notifier,
            image_queue,
            control,
        })),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn test_config() -> Config {
        Config {
            bind_port: 0,
            control_port: 0,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn background_tasks_start_once() {
        let services = bootstrap_services(&test_config()).unwrap();
        assert!(services.control_addr().ip().is_loopback());
        assert!(services.start_background_tasks());
        assert!(!services.start_background_tasks());
        assert_eq!(services.notifier.client_count().await, 0);
        services.shutdown();
    }

    #[tokio::test]
    async fn missing_fixture_is_a_playlist_error() {
        let config = Config {
            playlist_file: Some("/nonexistent/onair/playlist.yaml".into()),
            ..test_config()
        };
        let err = bootstrap_services(&config).err().unwrap();
        assert_eq!(err.code(), "playlist_error");
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = Config {
            image_queue_delay_ms: 0,
            ..test_config()
        };
        let err = bootstrap_services(&config).err().unwrap();
        assert_eq!(err.code(), "configuration_error");
    }

    #[tokio::test]
    async fn loads_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "shows: []\nalbums: []").unwrap();
        let config = Config {
            playlist_file: Some(file.path().to_path_buf()),
            ..test_config()
        };
        assert!(bootstrap_services(&config).is_ok());
    }
}
