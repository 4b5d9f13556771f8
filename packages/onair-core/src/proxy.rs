//! Downstream proxy fan-out.
//!
//! Each configured proxy URL gets one long-lived WebSocket client that
//! mirrors every group broadcast, so a relay elsewhere can serve the feed
//! to more clients than this host should carry.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::protocol_constants::{PROXY_BACKOFF_MAX_SECS, PROXY_BACKOFF_MIN_SECS};
use crate::services::Frame;

/// Returns the reconnect delay following `current`.
#[must_use]
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(Duration::from_secs(PROXY_BACKOFF_MAX_SECS))
}

type ProxyStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a connected session ended.
enum SessionEnd {
    Disconnected,
    Shutdown,
}

/// Keeps one proxy connection alive until cancelled.
///
/// While disconnected, only the most recent frame is kept; it is replayed
/// first thing after every reconnect.
pub async fn run_proxy(
    url: String,
    mut frames: broadcast::Receiver<Frame>,
    cancel: CancellationToken,
) {
    let mut latest: Option<Frame> = None;
    let mut delay = Duration::from_secs(PROXY_BACKOFF_MIN_SECS);

    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            connected = tokio_tungstenite::connect_async(url.as_str()) => connected,
        };

        match connected {
            Ok((stream, _)) => {
                log::info!("[Proxy] Connected to {}", url);
                delay = Duration::from_secs(PROXY_BACKOFF_MIN_SECS);
                match session(&url, stream, &mut frames, &mut latest, &cancel).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Disconnected => {
                        log::warn!("[Proxy] Lost connection to {}", url);
                    }
                }
            }
            Err(e) => {
                log::warn!(
                    "[Proxy] Connect to {} failed: {} (retry in {:?})",
                    url,
                    e,
                    delay
                );
            }
        }

        // Wait out the backoff, remembering only the newest frame.
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("[Proxy] Stopped ({})", url);
                    return;
                }
                _ = &mut sleep => break,
                frame = frames.recv() => match frame {
                    Ok(frame) => latest = Some(frame),
                    Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return,
                },
            }
        }
        delay = next_backoff(delay);
    }

    log::info!("[Proxy] Stopped ({})", url);
}

async fn session(
    url: &str,
    stream: ProxyStream,
    frames: &mut broadcast::Receiver<Frame>,
    latest: &mut Option<Frame>,
    cancel: &CancellationToken,
) -> SessionEnd {
    let (mut sink, mut incoming) = stream.split();

    if let Some(frame) = latest.as_ref() {
        if sink.send(Message::text(frame.to_string())).await.is_err() {
            return SessionEnd::Disconnected;
        }
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            frame = frames.recv() => match frame {
                Ok(frame) => {
                    *latest = Some(frame.clone());
                    if sink.send(Message::text(frame.to_string())).await.is_err() {
                        return SessionEnd::Disconnected;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("[Proxy] {} lagged, skipped {} frame(s)", url, skipped);
                }
                Err(RecvError::Closed) => return SessionEnd::Shutdown,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    return SessionEnd::Disconnected;
                }
                // The proxy has nothing to say to us; pings are answered
                // by the protocol layer.
                Some(Ok(_)) => {}
            },
        }
    }
}
