//! On-now filter over a show's timeline.
//!
//! Entries are stored in intended airing order, but an entry may be queued
//! before it airs and so carry no timestamp yet. Such an entry is only "in
//! force" once some later entry has a timestamp in the past; until then it is
//! still upcoming. Resolving that requires reading ahead, and everything read
//! ahead has to be replayed in order afterwards.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::PlaylistEvent;

/// Yields the timeline entries that are in force at a fixed instant.
///
/// A fresh filter is built for every poll; it is not meant to be reused once
/// [`fetch`](Self::fetch) has returned `None`.
pub struct LookaheadFilter<I>
where
    I: Iterator<Item = PlaylistEvent>,
{
    cursor: I,
    now: DateTime<Utc>,
    /// Entries read ahead but not yet returned, in stream order.
    buffer: VecDeque<PlaylistEvent>,
    /// Set once the filter has decided nothing further is in force.
    exhausted: bool,
}

impl<I> LookaheadFilter<I>
where
    I: Iterator<Item = PlaylistEvent>,
{
    /// Wraps an ordered stream of entries, evaluating them against `now`.
    pub fn new<T>(events: T, now: DateTime<Utc>) -> Self
    where
        T: IntoIterator<Item = PlaylistEvent, IntoIter = I>,
    {
        Self {
            cursor: events.into_iter(),
            now,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn is_past(&self, event: &PlaylistEvent) -> bool {
        event.created.is_some_and(|t| t <= self.now)
    }

    /// Returns the next entry in force, or `None` once the upcoming part of
    /// the timeline is reached.
    pub fn fetch(&mut self) -> Option<PlaylistEvent> {
        if self.exhausted {
            return None;
        }

        // Entries read ahead were already confirmed; replay them as-is.
        if let Some(event) = self.buffer.pop_front() {
            return Some(event);
        }

        let Some(event) = self.cursor.next() else {
            self.exhausted = true;
            return None;
        };

        match event.created {
            Some(_) if self.is_past(&event) => Some(event),
            Some(_) => {
                // Scheduled in the future; hold it so peek() can report it.
                self.buffer.push_back(event);
                self.exhausted = true;
                None
            }
            None => self.confirm(event),
        }
    }

    /// Reads ahead until a past-timestamped entry confirms that `pending` has
    /// already aired.
    fn confirm(&mut self, pending: PlaylistEvent) -> Option<PlaylistEvent> {
        while let Some(next) = self.cursor.next() {
            match next.created {
                Some(_) if self.is_past(&next) => {
                    self.buffer.push_back(next);
                    return Some(pending);
                }
                Some(_) => {
                    // Timestamps are non-decreasing, so nothing later can
                    // confirm the pending entry either.
                    self.buffer.push_back(next);
                    break;
                }
                None => self.buffer.push_back(next),
            }
        }

        self.exhausted = true;
        None
    }

    /// Returns the timestamp of the earliest read-ahead entry that has one,
    /// without consuming anything.
    #[must_use]
    pub fn peek(&self) -> Option<DateTime<Utc>> {
        self.buffer.iter().find_map(|event| event.created)
    }
}

impl<I> Iterator for LookaheadFilter<I>
where
    I: Iterator<Item = PlaylistEvent>,
{
    type Item = PlaylistEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.fetch()
    }
}
