//! HTTP/WebSocket API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::artwork::ArtworkStore;
use crate::services::NotifierHandle;

pub mod http;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast group membership and on-demand publishing.
    pub notifier: NotifierHandle,
    /// Artwork cache, for resolving image references.
    pub store: Arc<dyn ArtworkStore>,
    /// Tracks push connections.
    pub ws_manager: Arc<WsConnectionManager>,
}

/// Binds the push server on all interfaces.
pub async fn bind(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { port, source })
}

/// Serves HTTP and push connections on `listener` until `cancel` fires.
///
/// On shutdown every open push connection is force-closed.
pub async fn start_server(
    state: AppState,
    listener: TcpListener,
    cancel: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Server listening on http://{}", addr);
    }
    let ws_manager = Arc::clone(&state.ws_manager);
    let app = http::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancel.cancelled().await;
        ws_manager.close_all();
    })
    .await?;

    log::info!("[Server] Stopped");
    Ok(())
}
