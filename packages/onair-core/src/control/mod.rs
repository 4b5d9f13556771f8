//! Host-local control channel.
//!
//! Other processes on the same machine (the playlist editor, cron jobs)
//! nudge the running service with single UDP datagrams carrying a tiny text
//! protocol. There is no acknowledgment: anything unrecognised is dropped.
//!
//! | Message                        | Effect                                 |
//! |--------------------------------|----------------------------------------|
//! | `loadImages(<show>)`           | pre-fetch art for every spin of a show |
//! | `loadImages(<show>,<track>)`   | pre-fetch art for one spin             |
//! | `reloadAlbum(<tag>)`           | reload an album's art                  |
//! | `reloadAlbum(<tag>,<param>)`   | reload with a packed candidate choice  |
//! | `{...}`                        | broadcast a pre-built snapshot         |
//! | empty datagram                 | poll now                               |

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use thiserror::Error;
use tokio::net::UdpSocket;

mod listener;

pub use listener::{dispatch, ControlListener};

use crate::services::ReloadParam;

/// Errors raised by the control channel.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The listener socket could not be set up.
    #[error("failed to bind control socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// A control datagram could not be sent.
    #[error("failed to send control message: {0}")]
    Send(#[from] std::io::Error),
}

/// A decoded control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Poll the playlist now.
    Poll,
    /// Pre-fetch art for a show, or for a single spin of it.
    LoadImages {
        playlist_id: u64,
        track_id: Option<u64>,
    },
    /// Reload an album's art, optionally picking another candidate.
    ReloadAlbum { tag: u64, param: Option<u32> },
    /// Raw JSON of a pre-built snapshot.
    Snapshot(String),
}

impl ControlCommand {
    /// Decodes a datagram. Returns `None` for anything unrecognised.
    ///
    /// Matching is exact and case-sensitive; surrounding whitespace makes a
    /// message unrecognised.
    pub fn parse(message: &str) -> Option<Self> {
        if message.is_empty() {
            return Some(Self::Poll);
        }
        if message.starts_with('{') {
            return Some(Self::Snapshot(message.to_string()));
        }
        if let Some(args) = call_args(message, "loadImages") {
            let (playlist_id, track_id) = parse_args(args)?;
            return Some(Self::LoadImages {
                playlist_id,
                track_id,
            });
        }
        if let Some(args) = call_args(message, "reloadAlbum") {
            let (tag, param) = parse_args(args)?;
            let param = param.map(u32::try_from).transpose().ok()?;
            return Some(Self::ReloadAlbum { tag, param });
        }
        None
    }

    /// Returns the packed reload parameter, defaulting when absent.
    #[must_use]
    pub fn reload_param(param: Option<u32>) -> ReloadParam {
        param.map(ReloadParam::from_packed).unwrap_or_default()
    }
}

/// Returns the text between `name(` and the closing `)`.
fn call_args<'a>(message: &'a str, name: &str) -> Option<&'a str> {
    message
        .strip_prefix(name)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_number(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Parses `<n>` or `<n>,<m>`; a single space after the comma is allowed.
fn parse_args(args: &str) -> Option<(u64, Option<u64>)> {
    match args.split_once(',') {
        None => Some((parse_number(args)?, None)),
        Some((first, second)) => {
            let second = second.strip_prefix(' ').unwrap_or(second);
            Some((parse_number(first)?, Some(parse_number(second)?)))
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poll => Ok(()),
            Self::LoadImages {
                playlist_id,
                track_id: None,
            } => write!(f, "loadImages({})", playlist_id),
            Self::LoadImages {
                playlist_id,
                track_id: Some(track_id),
            } => write!(f, "loadImages({},{})", playlist_id, track_id),
            Self::ReloadAlbum { tag, param: None } => write!(f, "reloadAlbum({})", tag),
            Self::ReloadAlbum {
                tag,
                param: Some(param),
            } => write!(f, "reloadAlbum({},{})", tag, param),
            Self::Snapshot(json) => f.write_str(json),
        }
    }
}

/// Sends a raw control message to a running instance.
pub async fn send_raw(addr: SocketAddr, message: &str) -> Result<(), ControlError> {
    let local = if addr.is_ipv6() {
        SocketAddr::from((Ipv6Addr::LOCALHOST, 0))
    } else {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    };
    let socket = UdpSocket::bind(local).await?;
    socket.send_to(message.as_bytes(), addr).await?;
    log::debug!("[Control] Sent {:?} to {}", message, addr);
    Ok(())
}

/// Sends a command to a running instance.
pub async fn send_control(addr: SocketAddr, command: &ControlCommand) -> Result<(), ControlError> {
    send_raw(addr, &command.to_string()).await
}
