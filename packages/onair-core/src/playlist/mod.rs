//! Playlist data model and the read-only source abstraction.
//!
//! A [`Show`] is an aired playlist session; its timeline is an ordered list of
//! [`PlaylistEvent`]s. The source of shows and events lives outside this
//! service (the station database), so it is reached through the
//! [`PlaylistSource`] trait.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod lookahead;
mod memory;
pub mod names;

pub use lookahead::LookaheadFilter;
pub use memory::MemoryPlaylistSource;

/// Errors raised by a [`PlaylistSource`].
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// The backing store could not be reached or queried.
    #[error("playlist source unavailable: {0}")]
    Unavailable(String),

    /// The playlist fixture could not be read or parsed.
    #[error("failed to load playlist fixture: {0}")]
    Fixture(String),
}

/// Convenient Result alias for playlist operations.
pub type PlaylistResult<T> = Result<T, PlaylistError>;

/// A scheduled/aired playlist session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: u64,
    pub name: String,
    /// Presenter display name.
    pub airname: Option<String>,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A played track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spin {
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub track: String,
    /// Catalog identifier of the album, if the spin came from the library.
    #[serde(default)]
    pub tag: Option<u64>,
}

/// Payload of a timeline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    Spin(Spin),
    Comment {
        #[serde(default)]
        text: String,
    },
    LogEvent {
        #[serde(rename = "eventType")]
        event_type: String,
        #[serde(default)]
        code: String,
    },
    Break,
}

/// One entry in a show's timeline.
///
/// `created` is `None` for entries that have been queued but not yet
/// timestamped (for example a track entered ahead of airing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEvent {
    pub id: u64,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl PlaylistEvent {
    /// Returns the spin payload if this entry is a spin.
    #[must_use]
    pub fn as_spin(&self) -> Option<&Spin> {
        match &self.kind {
            EventKind::Spin(spin) => Some(spin),
            _ => None,
        }
    }
}

/// Catalog entry for an album, keyed by tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub tag: u64,
    pub artist: String,
    pub album: String,
}

/// Read-only access to the station playlist database.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Returns the show airing at `now`, if any.
    async fn get_whats_on_now(&self, now: DateTime<Utc>) -> PlaylistResult<Option<Show>>;

    /// Returns the show's timeline in intended airing order.
    async fn get_events(&self, show_id: u64) -> PlaylistResult<Vec<PlaylistEvent>>;

    /// Returns a single timeline entry by id.
    async fn get_track(&self, event_id: u64) -> PlaylistResult<Option<PlaylistEvent>>;

    /// Looks up a library album by tag.
    async fn get_album(&self, tag: u64) -> PlaylistResult<Option<Album>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_event_deserializes_from_tagged_yaml() {
        let yaml = r#"
id: 42
created: 2024-03-01T18:05:00Z
type: spin
artist: "Smith, John"
album: Songs
track: First
tag: 1001
"#;
        let event: PlaylistEvent = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(event.id, 42);
        assert!(event.created.is_some());
        let spin = event.as_spin().unwrap();
        assert_eq!(spin.artist, "Smith, John");
        assert_eq!(spin.tag, Some(1001));
    }

    #[test]
    fn untimestamped_break_deserializes() {
        let event: PlaylistEvent = serde_yaml::from_str("id: 7\ntype: break\n").unwrap();
        assert_eq!(event.created, None);
        assert_eq!(event.kind, EventKind::Break);
        assert!(event.as_spin().is_none());
    }

    #[test]
    fn log_event_keeps_type_and_code() {
        let yaml = "id: 3\ntype: logEvent\neventType: PSA\ncode: '1234'\n";
        let event: PlaylistEvent = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            event.kind,
            EventKind::LogEvent {
                event_type: "PSA".into(),
                code: "1234".into()
            }
        );
    }
}
