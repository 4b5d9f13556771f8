//! Now-playing snapshot and change tracking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::playlist::{
    names, EventKind, LookaheadFilter, PlaylistEvent, PlaylistResult, PlaylistSource, Show,
};
use crate::protocol_constants::SNAPSHOT_TYPE;

/// What the snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotEvent {
    /// Nothing is airing.
    #[default]
    None,
    /// A show is airing but no track is currently in force.
    Show,
    /// A track is airing.
    Track,
}

/// The on-air state pushed to clients.
///
/// Field order is the wire order; two snapshots are considered equal when
/// their serialized forms are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NowSnapshot {
    pub name: String,
    pub airname: String,
    pub show_id: u64,
    pub id: u64,
    pub track_title: String,
    pub track_artist: String,
    pub track_album: String,
    pub track_tag: Option<u64>,
    pub track_time: String,
    #[serde(rename = "type")]
    pub source: String,
    pub event: SnapshotEvent,
    pub info_url: String,
    pub image_url: String,
}

impl Default for NowSnapshot {
    fn default() -> Self {
        Self {
            name: String::new(),
            airname: String::new(),
            show_id: 0,
            id: 0,
            track_title: String::new(),
            track_artist: String::new(),
            track_album: String::new(),
            track_tag: None,
            track_time: String::new(),
            source: SNAPSHOT_TYPE.to_string(),
            event: SnapshotEvent::None,
            info_url: String::new(),
            image_url: String::new(),
        }
    }
}

impl NowSnapshot {
    /// Serialized form used both on the wire and for change detection.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn clear_track(&mut self) {
        self.id = 0;
        self.track_title.clear();
        self.track_artist.clear();
        self.track_album.clear();
        self.track_tag = None;
        self.track_time.clear();
    }

    fn apply(&mut self, event: &PlaylistEvent) {
        match &event.kind {
            EventKind::Spin(spin) => {
                self.id = event.id;
                self.track_title = spin.track.clone();
                self.track_artist = names::display_artist(spin);
                self.track_album = spin.album.clone();
                self.track_tag = spin.tag;
                self.track_time = event
                    .created
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
            }
            // Anything aired after a spin means the spin is no longer on.
            EventKind::Comment { .. } | EventKind::LogEvent { .. } | EventKind::Break => {
                self.clear_track();
            }
        }
    }
}

/// Builds the snapshot for `show` at `now`.
///
/// Returns the snapshot and the time of the next known upcoming entry.
#[must_use]
pub fn build_snapshot(
    show: Option<&Show>,
    events: Vec<PlaylistEvent>,
    now: DateTime<Utc>,
) -> (NowSnapshot, Option<DateTime<Utc>>) {
    let mut snapshot = NowSnapshot::default();
    let Some(show) = show else {
        return (snapshot, None);
    };

    snapshot.name = show.name.clone();
    snapshot.airname = show.airname.clone().unwrap_or_default();
    snapshot.show_id = show.id;

    let mut filter = LookaheadFilter::new(events, now);
    while let Some(event) = filter.fetch() {
        snapshot.apply(&event);
    }

    snapshot.event = if snapshot.id != 0 {
        SnapshotEvent::Track
    } else {
        SnapshotEvent::Show
    };

    (snapshot, filter.peek())
}

/// Result of one [`NowStateTracker::poll`].
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub snapshot: NowSnapshot,
    /// `false` if the snapshot serializes identically to the previous one.
    pub changed: bool,
    /// When the next known entry is due, if any.
    pub next_event: Option<DateTime<Utc>>,
}

/// Polls the playlist source and detects on-air changes.
pub struct NowStateTracker {
    source: Arc<dyn PlaylistSource>,
    previous: Option<String>,
}

impl NowStateTracker {
    pub fn new(source: Arc<dyn PlaylistSource>) -> Self {
        Self {
            source,
            previous: None,
        }
    }

    /// Polls at the current wall-clock time.
    pub async fn poll(&mut self) -> PlaylistResult<PollOutcome> {
        self.poll_at(Utc::now()).await
    }

    /// Polls as of `now`.
    ///
    /// On error the previous snapshot is kept, so the next successful poll
    /// still compares against the last state clients saw.
    pub async fn poll_at(&mut self, now: DateTime<Utc>) -> PlaylistResult<PollOutcome> {
        let show = self.source.get_whats_on_now(now).await?;
        let events = match &show {
            Some(show) => self.source.get_events(show.id).await?,
            None => Vec::new(),
        };

        let (snapshot, next_event) = build_snapshot(show.as_ref(), events, now);
        let json = snapshot.to_json();
        let changed = self.previous.as_deref() != Some(json.as_str());
        self.previous = Some(json);

        Ok(PollOutcome {
            snapshot,
            changed,
            next_event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::{MemoryPlaylistSource, PlaylistError, Spin};
    use async_trait::async_trait;
    use chrono::{Duration, Local, NaiveTime};

    fn spin_event(
        id: u64,
        artist: &str,
        tag: Option<u64>,
        created: Option<DateTime<Utc>>,
    ) -> PlaylistEvent {
        PlaylistEvent {
            id,
            created,
            kind: EventKind::Spin(Spin {
                artist: artist.into(),
                album: "Album".into(),
                label: "Label".into(),
                track: format!("Track {}", id),
                tag,
            }),
        }
    }

    fn comment(id: u64, created: Option<DateTime<Utc>>) -> PlaylistEvent {
        PlaylistEvent {
            id,
            created,
            kind: EventKind::Comment {
                text: "talking".into(),
            },
        }
    }

    /// A show spanning the whole local day of `now`.
    fn all_day_show(now: DateTime<Utc>) -> Show {
        Show {
            id: 9,
            name: "All Day".into(),
            airname: Some("DJ Test".into()),
            date: now.with_timezone(&Local).date_naive(),
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn no_show_yields_none_event() {
        let (snapshot, next) = build_snapshot(None, vec![], Utc::now());
        assert_eq!(snapshot.event, SnapshotEvent::None);
        assert_eq!(snapshot.show_id, 0);
        assert_eq!(snapshot.id, 0);
        assert_eq!(snapshot.source, "zookeeper");
        assert!(next.is_none());
    }

    #[test]
    fn wire_format_has_every_field() {
        let json: serde_json::Value =
            serde_json::from_str(&NowSnapshot::default().to_json()).unwrap();
        for field in [
            "name",
            "airname",
            "show_id",
            "id",
            "track_title",
            "track_artist",
            "track_album",
            "track_tag",
            "track_time",
            "type",
            "event",
            "info_url",
            "image_url",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(json["event"], "none");
        assert!(json["track_tag"].is_null());
    }

    #[test]
    fn latest_spin_is_current_and_tagged_artist_is_swapped() {
        let now = Utc::now();
        let show = all_day_show(now);
        let events = vec![
            spin_event(1, "Wire", None, Some(now - Duration::minutes(8))),
            spin_event(2, "Smith, John", Some(55), Some(now - Duration::minutes(4))),
        ];
        let (snapshot, _) = build_snapshot(Some(&show), events, now);

        assert_eq!(snapshot.event, SnapshotEvent::Track);
        assert_eq!(snapshot.id, 2);
        assert_eq!(snapshot.track_artist, "John Smith");
        assert_eq!(snapshot.track_tag, Some(55));
        assert_eq!(snapshot.airname, "DJ Test");
        assert!(!snapshot.track_time.is_empty());
    }

    #[test]
    fn comment_after_spin_clears_track() {
        let now = Utc::now();
        let show = all_day_show(now);
        let events = vec![
            spin_event(1, "Wire", None, Some(now - Duration::minutes(8))),
            comment(2, Some(now - Duration::minutes(1))),
        ];
        let (snapshot, _) = build_snapshot(Some(&show), events, now);
        assert_eq!(snapshot.event, SnapshotEvent::Show);
        assert_eq!(snapshot.id, 0);
        assert!(snapshot.track_title.is_empty());
    }

    #[test]
    fn reports_next_upcoming_entry() {
        let now = Utc::now();
        let next = now + Duration::seconds(5);
        let show = all_day_show(now);
        let events = vec![
            spin_event(1, "Wire", None, Some(now - Duration::minutes(2))),
            spin_event(2, "Can", None, Some(next)),
        ];
        let (snapshot, upcoming) = build_snapshot(Some(&show), events, now);
        assert_eq!(snapshot.id, 1);
        assert_eq!(upcoming, Some(next));
    }

    #[tokio::test]
    async fn tracker_reports_change_only_once() {
        let now = Utc::now();
        let source = Arc::new(MemoryPlaylistSource::new());
        source.insert_show(
            all_day_show(now),
            vec![spin_event(1, "Wire", None, Some(now - Duration::minutes(1)))],
        );
        let mut tracker = NowStateTracker::new(source.clone());

        assert!(tracker.poll_at(now).await.unwrap().changed);
        assert!(!tracker.poll_at(now).await.unwrap().changed);

        source.push_event(9, spin_event(2, "Can", None, Some(now)));
        let outcome = tracker.poll_at(now).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.snapshot.id, 2);
    }

    struct FailingSource;

    #[async_trait]
    impl PlaylistSource for FailingSource {
        async fn get_whats_on_now(&self, _now: DateTime<Utc>) -> PlaylistResult<Option<Show>> {
            Err(PlaylistError::Unavailable("db down".into()))
        }
        async fn get_events(&self, _show_id: u64) -> PlaylistResult<Vec<PlaylistEvent>> {
            Ok(vec![])
        }
        async fn get_track(&self, _event_id: u64) -> PlaylistResult<Option<PlaylistEvent>> {
            Ok(None)
        }
        async fn get_album(&self, _tag: u64) -> PlaylistResult<Option<crate::playlist::Album>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn source_failure_propagates() {
        let mut tracker = NowStateTracker::new(Arc::new(FailingSource));
        assert!(tracker.poll().await.is_err());
    }
}
