//! Background artwork pre-fetching.
//!
//! The queue walks a show's spins and resolves their art ahead of time, one
//! provider lookup per interval, so the resolver usually finds art in the
//! cache by the time a track airs.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::artwork::lookup::{self, ArtLookup};
use crate::artwork::ArtworkStore;
use crate::error::ErrorCode;
use crate::metadata::{MetadataProvider, ProviderResult, ReleaseKind};
use crate::playlist::{names, PlaylistEvent, PlaylistSource, Spin};

/// Selects which provider candidate a manual album reload picks.
///
/// On the control channel both travel in one integer: bit 0 selects the
/// master release, bits 8 and up hold the number of candidates to skip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadParam {
    pub master: bool,
    pub skip: u32,
}

impl ReloadParam {
    pub fn from_packed(packed: u32) -> Self {
        Self {
            master: packed & 1 != 0,
            skip: packed >> 8,
        }
    }

    #[must_use]
    pub fn packed(self) -> u32 {
        (self.skip << 8) | u32::from(self.master)
    }

    fn kind(self) -> ReleaseKind {
        if self.master {
            ReleaseKind::Master
        } else {
            ReleaseKind::Release
        }
    }
}

/// Requests accepted by the [`ImageQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCommand {
    /// Pre-fetch art for every spin of a show.
    Scan { playlist_id: u64 },
    /// Pre-fetch art for one spin of a show.
    Track { playlist_id: u64, track_id: u64 },
    /// Replace the cached art of an album with a chosen provider candidate.
    ReloadAlbum { tag: u64, param: ReloadParam },
}

/// Art to fetch for one spin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
    /// Display name, already swapped for library spins.
    pub artist: String,
    pub album: String,
    pub tag: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueuedJob {
    Fetch(ImageJob),
    Reload { tag: u64, param: ReloadParam },
}

/// Handle for submitting work to the [`ImageQueue`].
#[derive(Clone)]
pub struct ImageQueueHandle {
    sender: mpsc::UnboundedSender<ImageCommand>,
}

impl ImageQueueHandle {
    /// Submits a request. Dropped with a log line if the queue has stopped.
    pub fn submit(&self, cmd: ImageCommand) {
        if self.sender.send(cmd).is_err() {
            log::debug!("[ImageQueue] Request dropped, queue has stopped");
        }
    }

    /// Queues a show, or a single track of it, for pre-fetching.
    pub fn enqueue(&self, playlist_id: u64, track_id: Option<u64>) {
        self.submit(match track_id {
            Some(track_id) => ImageCommand::Track {
                playlist_id,
                track_id,
            },
            None => ImageCommand::Scan { playlist_id },
        });
    }

    /// Queues a manual reload of an album's art.
    pub fn reload_album(&self, tag: u64, param: ReloadParam) {
        self.submit(ImageCommand::ReloadAlbum { tag, param });
    }

    /// A handle whose requests land in the returned receiver.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<ImageCommand>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

/// Rate-limited artwork fetch worker.
///
/// Jobs run one at a time with at least `delay` between provider lookups.
/// Without a provider every request is ignored.
pub struct ImageQueue {
    receiver: mpsc::UnboundedReceiver<ImageCommand>,
    source: Arc<dyn PlaylistSource>,
    store: Arc<dyn ArtworkStore>,
    provider: Option<Arc<dyn MetadataProvider>>,
    queue: VecDeque<QueuedJob>,
    delay: Duration,
    /// Earliest time the next job may start.
    next_slot: Instant,
}

enum Step {
    Command(ImageCommand),
    Process,
    Shutdown,
}

impl ImageQueue {
    pub fn new(
        source: Arc<dyn PlaylistSource>,
        store: Arc<dyn ArtworkStore>,
        provider: Option<Arc<dyn MetadataProvider>>,
        delay: Duration,
    ) -> (Self, ImageQueueHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            receiver,
            source,
            store,
            provider,
            queue: VecDeque::new(),
            delay,
            next_slot: Instant::now(),
        };
        (queue, ImageQueueHandle { sender })
    }

    /// Number of jobs waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Runs the worker until cancelled or every handle is dropped.
    pub async fn run(mut self, cancel: CancellationToken) {
        log::info!(
            "[ImageQueue] Started (delay {:?}, provider {})",
            self.delay,
            if self.provider.is_some() {
                "configured"
            } else {
                "not configured"
            }
        );

        loop {
            let busy = !self.queue.is_empty();
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Shutdown,
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => Step::Command(cmd),
                    None => Step::Shutdown,
                },
                _ = tokio::time::sleep_until(self.next_slot), if busy => Step::Process,
            };

            match step {
                Step::Command(cmd) => {
                    self.handle(cmd).await;
                }
                Step::Process => {
                    self.process_next().await;
                    self.next_slot = Instant::now() + self.delay;
                }
                Step::Shutdown => break,
            }
        }

        log::info!("[ImageQueue] Stopped ({} job(s) dropped)", self.queue.len());
    }

    /// Applies a request to the queue. Returns the number of jobs added.
    pub async fn handle(&mut self, cmd: ImageCommand) -> usize {
        if self.provider.is_none() {
            return 0;
        }
        match cmd {
            ImageCommand::Scan { playlist_id } => self.enqueue(playlist_id, None).await,
            ImageCommand::Track {
                playlist_id,
                track_id,
            } => self.enqueue(playlist_id, Some(track_id)).await,
            ImageCommand::ReloadAlbum { tag, param } => {
                // Manual reloads jump the queue.
                self.queue.push_front(QueuedJob::Reload { tag, param });
                1
            }
        }
    }

    async fn enqueue(&mut self, playlist_id: u64, track_id: Option<u64>) -> usize {
        let events = match track_id {
            Some(track_id) => match self.source.get_track(track_id).await {
                Ok(event) => event.into_iter().collect(),
                Err(e) => {
                    log::warn!("[ImageQueue] Failed to load track {}: {}", track_id, e);
                    return 0;
                }
            },
            None => match self.source.get_events(playlist_id).await {
                Ok(events) => events,
                Err(e) => {
                    log::warn!("[ImageQueue] Failed to load show {}: {}", playlist_id, e);
                    return 0;
                }
            },
        };

        let mut seen = HashSet::new();
        let mut added = 0;
        for event in &events {
            let Some(job) = Self::job_for(event) else {
                continue;
            };
            if !seen.insert((job.artist.clone(), job.tag)) {
                continue;
            }
            if self.is_cached(&job).await || self.is_queued(&job) {
                continue;
            }
            self.queue.push_back(QueuedJob::Fetch(job));
            added += 1;
        }

        if added > 0 {
            log::info!(
                "[ImageQueue] Queued {} job(s) from show {} ({} pending)",
                added,
                playlist_id,
                self.queue.len()
            );
        }
        added
    }

    /// Builds a job for a spin worth looking up.
    fn job_for(event: &PlaylistEvent) -> Option<ImageJob> {
        let spin: &Spin = event.as_spin()?;
        if event.created.is_none() || names::is_psa(spin) || spin.artist.trim().is_empty() {
            return None;
        }
        Some(ImageJob {
            artist: names::display_artist(spin),
            album: spin.album.clone(),
            tag: spin.tag,
        })
    }

    /// A spin is covered if either its album or its artist has a record.
    async fn is_cached(&self, job: &ImageJob) -> bool {
        if let Some(tag) = job.tag {
            if self.album_cached(tag).await {
                return true;
            }
        }
        self.artist_cached(&job.artist).await
    }

    async fn album_cached(&self, tag: u64) -> bool {
        match self.store.get_album_art(tag, false).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                log::warn!("[ImageQueue] Cache check for tag {} failed: {}", tag, e);
                false
            }
        }
    }

    async fn artist_cached(&self, artist: &str) -> bool {
        match self
            .store
            .get_artist_art(&names::artist_key(artist), false)
            .await
        {
            Ok(record) => record.is_some(),
            Err(e) => {
                log::warn!("[ImageQueue] Cache check for {:?} failed: {}", artist, e);
                false
            }
        }
    }

    fn is_queued(&self, job: &ImageJob) -> bool {
        self.queue.iter().any(|queued| match queued {
            QueuedJob::Fetch(other) => other.artist == job.artist && other.tag == job.tag,
            QueuedJob::Reload { .. } => false,
        })
    }

    /// Runs the job at the head of the queue.
    pub async fn process_next(&mut self) -> bool {
        let Some(job) = self.queue.pop_front() else {
            return false;
        };
        let Some(provider) = self.provider.clone() else {
            return false;
        };

        match job {
            QueuedJob::Fetch(job) => self.fetch(provider.as_ref(), job).await,
            QueuedJob::Reload { tag, param } => self.reload(provider.as_ref(), tag, param).await,
        }
        true
    }

    async fn fetch(&self, provider: &dyn MetadataProvider, job: ImageJob) {
        let stored = match job.tag {
            Some(tag) => {
                // The resolver may have filled the cache since queueing.
                if self.album_cached(tag).await {
                    return;
                }
                let result =
                    lookup::album_art(provider, &job.artist, &job.album, ReleaseKind::Release, 0)
                        .await;
                let Some(found) = Self::answered(result, &job) else {
                    return;
                };
                self.store
                    .insert_album_art(tag, found.image_url.as_deref(), found.info_url.as_deref())
                    .await
            }
            None => {
                if self.artist_cached(&job.artist).await {
                    return;
                }
                let result = lookup::artist_art(provider, &job.artist, Some(&job.album)).await;
                let Some(found) = Self::answered(result, &job) else {
                    return;
                };
                self.store
                    .insert_artist_art(
                        &names::artist_key(&job.artist),
                        found.image_url.as_deref(),
                        found.info_url.as_deref(),
                    )
                    .await
            }
        };

        match stored {
            Ok(image_ref) => log::debug!(
                "[ImageQueue] Fetched {:?} / {:?}: {}",
                job.artist,
                job.album,
                if image_ref.is_some() { "image" } else { "no image" }
            ),
            Err(e) => log::warn!(
                "[ImageQueue] Failed to cache art for {:?} ({}): {}",
                job.artist,
                e.code(),
                e
            ),
        }
    }

    /// Returns the provider's answer, or `None` after logging a failure.
    /// Nothing is cached for a failed lookup, so a later scan retries it.
    fn answered(lookup: ProviderResult<Option<ArtLookup>>, job: &ImageJob) -> Option<ArtLookup> {
        match lookup {
            Ok(found) => Some(found.unwrap_or_default()),
            Err(e) => {
                log::warn!(
                    "[ImageQueue] Lookup for {:?} / {:?} failed ({}): {}",
                    job.artist,
                    job.album,
                    e.code(),
                    e
                );
                None
            }
        }
    }

    async fn reload(&self, provider: &dyn MetadataProvider, tag: u64, param: ReloadParam) {
        let album = match self.source.get_album(tag).await {
            Ok(Some(album)) => album,
            Ok(None) => {
                log::warn!("[ImageQueue] Reload of unknown album tag {}", tag);
                return;
            }
            Err(e) => {
                log::warn!("[ImageQueue] Failed to load album {}: {}", tag, e);
                return;
            }
        };

        let artist = names::swap_names(&album.artist);
        let found = match lookup::album_art(
            provider,
            &artist,
            &album.album,
            param.kind(),
            param.skip as usize,
        )
        .await
        {
            Ok(Some(found)) if !found.is_empty() => found,
            Ok(_) => {
                log::info!(
                    "[ImageQueue] No candidate for tag {} ({:?}, skip {}), keeping cached art",
                    tag,
                    param.kind(),
                    param.skip
                );
                return;
            }
            Err(e) => {
                log::warn!(
                    "[ImageQueue] Reload lookup for tag {} failed ({}): {}",
                    tag,
                    e.code(),
                    e
                );
                return;
            }
        };

        let result = match self.store.delete_album_art(tag).await {
            Ok(()) => {
                self.store
                    .insert_album_art(tag, found.image_url.as_deref(), found.info_url.as_deref())
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => log::info!(
                "[ImageQueue] Reloaded art for tag {} ({:?}, skip {})",
                tag,
                param.kind(),
                param.skip
            ),
            Err(e) => log::warn!("[ImageQueue] Reload of tag {} failed: {}", tag, e),
        }
    }
}
