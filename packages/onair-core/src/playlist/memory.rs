//! In-memory playlist source, optionally seeded from a YAML fixture.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;

use super::{Album, PlaylistError, PlaylistEvent, PlaylistResult, PlaylistSource, Show};

#[derive(Debug, Deserialize)]
struct FixtureShow {
    #[serde(flatten)]
    show: Show,
    #[serde(default)]
    events: Vec<PlaylistEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fixture {
    shows: Vec<FixtureShow>,
    albums: Vec<Album>,
}

#[derive(Default)]
struct Inner {
    shows: Vec<Show>,
    events: HashMap<u64, Vec<PlaylistEvent>>,
    albums: HashMap<u64, Album>,
}

/// [`PlaylistSource`] held entirely in memory.
///
/// Show windows are interpreted in the host's local time zone, which is how
/// the station schedule is entered.
#[derive(Default)]
pub struct MemoryPlaylistSource {
    inner: RwLock<Inner>,
}

impl MemoryPlaylistSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML fixture with `shows` (each with nested `events`) and
    /// `albums` lists.
    pub fn from_yaml(yaml: &str) -> PlaylistResult<Self> {
        let fixture: Fixture =
            serde_yaml::from_str(yaml).map_err(|e| PlaylistError::Fixture(e.to_string()))?;

        let source = Self::new();
        for entry in fixture.shows {
            source.insert_show(entry.show, entry.events);
        }
        for album in fixture.albums {
            source.insert_album(album);
        }
        Ok(source)
    }

    /// Loads a YAML fixture from disk.
    pub fn from_yaml_file(path: &Path) -> PlaylistResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlaylistError::Fixture(format!("{}: {}", path.display(), e)))?;
        let source = Self::from_yaml(&content)?;
        log::info!(
            "[Playlist] Loaded {} show(s) from {}",
            source.inner.read().shows.len(),
            path.display()
        );
        Ok(source)
    }

    /// Adds or replaces a show and its timeline.
    pub fn insert_show(&self, show: Show, events: Vec<PlaylistEvent>) {
        let mut inner = self.inner.write();
        inner.shows.retain(|s| s.id != show.id);
        inner.events.insert(show.id, events);
        inner.shows.push(show);
    }

    /// Appends an entry to a show's timeline.
    pub fn push_event(&self, show_id: u64, event: PlaylistEvent) {
        self.inner
            .write()
            .events
            .entry(show_id)
            .or_default()
            .push(event);
    }

    /// Adds or replaces a library album.
    pub fn insert_album(&self, album: Album) {
        self.inner.write().albums.insert(album.tag, album);
    }
}

/// Returns whether `at` (local wall-clock time) falls inside the show window.
///
/// A window whose end is not after its start runs past midnight.
pub(crate) fn show_covers(show: &Show, at: NaiveDateTime) -> bool {
    let start = show.date.and_time(show.start);
    let mut end = show.date.and_time(show.end);
    if end <= start {
        end += Duration::days(1);
    }
    start <= at && at < end
}

#[async_trait]
impl PlaylistSource for MemoryPlaylistSource {
    async fn get_whats_on_now(&self, now: DateTime<Utc>) -> PlaylistResult<Option<Show>> {
        let local = now.with_timezone(&Local).naive_local();
        Ok(self
            .inner
            .read()
            .shows
            .iter()
            .find(|show| show_covers(show, local))
            .cloned())
    }

    async fn get_events(&self, show_id: u64) -> PlaylistResult<Vec<PlaylistEvent>> {
        Ok(self
            .inner
            .read()
            .events
            .get(&show_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_track(&self, event_id: u64) -> PlaylistResult<Option<PlaylistEvent>> {
        Ok(self
            .inner
            .read()
            .events
            .values()
            .flatten()
            .find(|event| event.id == event_id)
            .cloned())
    }

    async fn get_album(&self, tag: u64) -> PlaylistResult<Option<Album>> {
        Ok(self.inner.read().albums.get(&tag).cloned())
    }
}
