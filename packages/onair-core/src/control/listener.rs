//! Loopback UDP listener for control messages.

use std::net::{Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::{ControlCommand, ControlError};
use crate::protocol_constants::MAX_CONTROL_DATAGRAM;
use crate::services::{ImageQueueHandle, NotifierHandle, NowSnapshot};

/// Routes a decoded command to the service that handles it.
pub fn dispatch(command: ControlCommand, notifier: &NotifierHandle, images: &ImageQueueHandle) {
    match command {
        ControlCommand::Poll => notifier.poll(),
        ControlCommand::LoadImages {
            playlist_id,
            track_id,
        } => images.enqueue(playlist_id, track_id),
        ControlCommand::ReloadAlbum { tag, param } => {
            images.reload_album(tag, ControlCommand::reload_param(param));
        }
        ControlCommand::Snapshot(json) => match serde_json::from_str::<NowSnapshot>(&json) {
            Ok(snapshot) => notifier.publish(snapshot),
            Err(e) => log::debug!("[Control] Ignoring malformed snapshot: {}", e),
        },
    }
}

/// Receives control datagrams on the loopback interface.
///
/// Only loopback is ever bound; that is the channel's whole trust model.
pub struct ControlListener {
    socket: UdpSocket,
}

impl ControlListener {
    /// Binds `127.0.0.1:<port>`. Port 0 picks an ephemeral port.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(port: u16) -> Result<Self, ControlError> {
        let bind_err = |source| ControlError::Bind { port, source };
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;

        // SO_REUSEADDR - allows bind on rapid restarts
        if let Err(e) = socket.set_reuse_address(true) {
            log::warn!("[Control] Failed to set SO_REUSEADDR: {}", e);
        }

        socket.set_nonblocking(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket).map_err(bind_err)?;
        Ok(Self { socket })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, ControlError> {
        Ok(self.socket.local_addr()?)
    }

    /// Receives and dispatches datagrams until cancelled.
    pub async fn run(
        self,
        notifier: NotifierHandle,
        images: ImageQueueHandle,
        cancel: CancellationToken,
    ) {
        if let Ok(addr) = self.socket.local_addr() {
            log::info!("[Control] Listening on udp://{}", addr);
        }
        let mut buf = vec![0u8; MAX_CONTROL_DATAGRAM];

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.socket.recv_from(&mut buf) => received,
            };

            let (len, peer) = match received {
                Ok(received) => received,
                Err(e) => {
                    log::warn!("[Control] Receive failed: {}", e);
                    continue;
                }
            };

            let Ok(message) = std::str::from_utf8(&buf[..len]) else {
                log::debug!("[Control] Ignoring non-UTF-8 datagram from {}", peer);
                continue;
            };

            match ControlCommand::parse(message) {
                Some(command) => {
                    log::info!("[Control] {} from {}", describe(&command), peer);
                    dispatch(command, &notifier, &images);
                }
                None => log::debug!("[Control] Ignoring {:?} from {}", message, peer),
            }
        }

        log::info!("[Control] Stopped");
    }
}

/// Short log form; snapshots are not echoed in full.
fn describe(command: &ControlCommand) -> String {
    match command {
        ControlCommand::Poll => "poll".to_string(),
        ControlCommand::Snapshot(json) => format!("snapshot ({} bytes)", json.len()),
        other => other.to_string(),
    }
}
