//! Fixed protocol constants that should NOT be changed.
//!
//! These values are part of the contract with push clients, the control
//! channel peers and the metadata provider.

// ─────────────────────────────────────────────────────────────────────────────
// Push Protocol
// ─────────────────────────────────────────────────────────────────────────────

/// WebSocket route clients connect to for on-air updates.
pub const PUSH_ROUTE: &str = "/push/onair";

/// Value of the snapshot `type` field.
///
/// Clients use it to tell this feed apart from other station feeds.
pub const SNAPSHOT_TYPE: &str = "zookeeper";

/// Prefix of cached image paths handed to clients, relative to the web root.
pub const IMAGE_ROUTE_PREFIX: &str = "img/";

/// Image shown when the provider knows the subject but has no artwork.
pub const PROVIDER_ICON_PLACEHOLDER: &str = "img/discogs.svg";

/// Image shown when nothing at all is known about the subject.
pub const BLANK_PLACEHOLDER: &str = "img/blank.gif";

// ─────────────────────────────────────────────────────────────────────────────
// Scheduling
// ─────────────────────────────────────────────────────────────────────────────

/// Upcoming entries further away than this (seconds) are ignored by the
/// scheduler, which then falls back to the minute boundary.
pub const MAX_LOOKAHEAD_SECS: i64 = 60;

/// Slack added after a scheduled entry so the poll lands after it (seconds).
pub const SCHEDULE_SLACK_SECS: u64 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Control Channel
// ─────────────────────────────────────────────────────────────────────────────

/// Largest datagram accepted on the control channel (bytes).
///
/// Pre-built snapshots are sent whole in one datagram.
pub const MAX_CONTROL_DATAGRAM: usize = 64 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Metadata Provider
// ─────────────────────────────────────────────────────────────────────────────

/// Default provider API endpoint.
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.discogs.com";

/// Default provider request timeout (seconds).
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Default delay between background image fetches (milliseconds).
///
/// Keeps the image queue under the provider's anonymous rate limit.
pub const DEFAULT_IMAGE_QUEUE_DELAY_MS: u64 = 3000;

// ─────────────────────────────────────────────────────────────────────────────
// Proxy Fan-out
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the broadcast channel feeding proxy connections.
pub const MIRROR_CHANNEL_CAPACITY: usize = 16;

/// First reconnect delay for a dropped proxy connection (seconds).
pub const PROXY_BACKOFF_MIN_SECS: u64 = 1;

/// Reconnect delay ceiling for proxy connections (seconds).
pub const PROXY_BACKOFF_MAX_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in the provider `User-Agent`.
pub const APP_NAME: &str = "OnAirPush";

/// Service identifier reported by the health endpoint.
pub const SERVICE_ID: &str = "onair";

/// Default HTTP/WebSocket port.
pub const DEFAULT_BIND_PORT: u16 = 8888;

/// Default loopback UDP control port.
pub const DEFAULT_CONTROL_PORT: u16 = 5111;
