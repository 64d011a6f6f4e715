//! Shared, append-only, in-memory log with offsets.
//!
//! [`RecordLog`] backs the in-memory source and the change feeds of output tables. Entries are
//! addressed by their offset, the position at which they were appended, and readers can replay
//! the log from any offset and then follow new entries as they arrive.
//!
//! A log built with a retention keeps only its most recent entries. Offsets are never reused, so
//! a reader behind the retained window resumes at the oldest entry still held.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use futures::Stream;
use futures::stream;
use tokio::sync::watch;

/// Number of entries a tailing stream copies out of the log per lock acquisition.
const STREAM_CHUNK_SIZE: usize = 1_024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LogState {
    len: u64,
    closed: bool,
}

#[derive(Debug)]
struct Entries<T> {
    /// Offset of the front entry.
    first: u64,
    items: VecDeque<T>,
}

impl<T> Entries<T> {
    fn end(&self) -> u64 {
        self.first + self.items.len() as u64
    }

    fn evict_beyond(&mut self, retention: Option<usize>) {
        let Some(retention) = retention else {
            return;
        };

        let excess = self.items.len().saturating_sub(retention);
        if excess > 0 {
            self.items.drain(..excess);
            self.first += excess as u64;
        }
    }
}

#[derive(Debug)]
struct Inner<T> {
    entries: RwLock<Entries<T>>,
    retention: Option<usize>,
    state_tx: watch::Sender<LogState>,
}

/// Append-only log shared between writers and any number of readers.
///
/// Cloning returns a handle to the same log.
#[derive(Debug)]
pub struct RecordLog<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RecordLog<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for RecordLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordLog<T> {
    /// Creates a log keeping every entry.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a log keeping at most the `retention` most recent entries.
    pub fn with_retention(retention: usize) -> Self {
        Self::build(Some(retention.max(1)))
    }

    fn build(retention: Option<usize>) -> Self {
        let (state_tx, _) = watch::channel(LogState::default());

        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(Entries {
                    first: 0,
                    items: VecDeque::new(),
                }),
                retention,
                state_tx,
            }),
        }
    }

    /// Appends `entry` and returns its offset.
    pub fn append(&self, entry: T) -> u64 {
        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let offset = entries.end();
        entries.items.push_back(entry);
        entries.evict_beyond(self.inner.retention);
        self.publish_len(entries.end());

        offset
    }

    /// Appends all `entries` and returns the offset of the first one.
    pub fn extend<I>(&self, new_entries: I) -> u64
    where
        I: IntoIterator<Item = T>,
    {
        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let first = entries.end();
        entries.items.extend(new_entries);
        entries.evict_beyond(self.inner.retention);
        let len = entries.end();
        if len > first {
            self.publish_len(len);
        }

        first
    }

    /// Number of entries appended so far, which is also the next offset.
    pub fn len(&self) -> u64 {
        self.inner.state_tx.borrow().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the oldest entry still held.
    pub fn first_offset(&self) -> u64 {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .first
    }

    /// Number of entries currently held in memory.
    pub fn retained(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .len()
    }

    /// Marks the log as complete: tailing streams end once they have read every entry.
    ///
    /// Appends after closing are still accepted and visible to new readers.
    pub fn close(&self) {
        self.inner.state_tx.send_modify(|state| state.closed = true);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state_tx.borrow().closed
    }

    fn publish_len(&self, len: u64) {
        self.inner.state_tx.send_modify(|state| state.len = len);
    }
}

impl<T: Clone> RecordLog<T> {
    /// Returns up to `limit` entries starting at offset `from`.
    ///
    /// Evicted offsets are skipped.
    pub fn read(&self, from: u64, limit: usize) -> Vec<(u64, T)> {
        let entries = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let from = from.max(entries.first);
        let start = usize::try_from(from - entries.first)
            .unwrap_or(usize::MAX)
            .min(entries.items.len());
        entries
            .items
            .range(start..)
            .take(limit)
            .cloned()
            .enumerate()
            .map(|(index, entry)| (from + index as u64, entry))
            .collect()
    }

    /// Returns a copy of every held entry.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .iter()
            .cloned()
            .collect()
    }
}

impl<T> RecordLog<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Streams `(offset, entry)` pairs starting at `from`, then waits for new entries.
    ///
    /// The stream ends when it has caught up with a closed log.
    pub fn stream_from(&self, from: u64) -> impl Stream<Item = (u64, T)> + Send + 'static {
        let tail = Tail {
            log: self.clone(),
            state_rx: self.inner.state_tx.subscribe(),
            next: from,
            buffer: VecDeque::new(),
        };

        stream::unfold(tail, |mut tail| async move {
            let item = tail.next_entry().await?;
            Some((item, tail))
        })
    }
}

struct Tail<T> {
    log: RecordLog<T>,
    state_rx: watch::Receiver<LogState>,
    next: u64,
    buffer: VecDeque<(u64, T)>,
}

impl<T> Tail<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn next_entry(&mut self) -> Option<(u64, T)> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(entry);
            }

            // The state is marked as seen before reading, so an append racing with the read
            // wakes the `changed` call below.
            let state = *self.state_rx.borrow_and_update();
            let chunk = self.log.read(self.next, STREAM_CHUNK_SIZE);
            if let Some((last, _)) = chunk.last() {
                self.next = last + 1;
                self.buffer.extend(chunk);
                continue;
            }

            if state.closed && self.next >= state.len {
                return None;
            }

            // The sender lives as long as the log we hold, so this only errors on teardown.
            self.state_rx.changed().await.ok()?;
        }
    }
}
