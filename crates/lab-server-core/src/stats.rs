//! Server-wide counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the accept loop, dispatchers and stream tasks.
#[derive(Debug, Default)]
pub struct ServerStats {
    connections_accepted: AtomicU64,
    streams_accepted: AtomicU64,
    streams_completed: AtomicU64,
    streams_failed: AtomicU64,
}

/// A point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub streams_accepted: u64,
    pub streams_completed: u64,
    pub streams_failed: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stream_accepted(&self) {
        self.streams_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stream_completed(&self) {
        self.streams_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn stream_failed(&self) {
        self.streams_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            streams_accepted: self.streams_accepted.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            streams_failed: self.streams_failed.load(Ordering::Relaxed),
        }
    }
}
