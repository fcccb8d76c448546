//! Optional timing hooks for the read path.
//!
//! Readers call a [`ReadObserver`] after opening a container, after reading
//! its bytes and after each decode.  The default observer does nothing.
//! [`ReadStats`] keeps lock-free counters and can be shared by any number
//! of concurrent readers.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

pub trait ReadObserver: Send + Sync {
    fn on_open(&self, _path: &Path, _elapsed: Duration) {}
    fn on_read(&self, _path: &Path, _bytes: u64, _elapsed: Duration) {}
    fn on_decode(&self, _record_id: &str, _elapsed: Duration) {}
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ReadObserver for NoopObserver {}

/// Cumulative counters over every observed event.
#[derive(Debug, Default)]
pub struct ReadStats {
    opens:        AtomicU64,
    reads:        AtomicU64,
    bytes_read:   AtomicU64,
    decodes:      AtomicU64,
    open_nanos:   AtomicU64,
    read_nanos:   AtomicU64,
    decode_nanos: AtomicU64,
}

/// Point-in-time copy of [`ReadStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub opens:      u64,
    pub reads:      u64,
    pub bytes_read: u64,
    pub decodes:    u64,
    pub open_time:   Duration,
    pub read_time:   Duration,
    pub decode_time: Duration,
}

impl ReadStats {
    pub fn new() -> Self { Self::default() }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            opens:       self.opens.load(Ordering::Relaxed),
            reads:       self.reads.load(Ordering::Relaxed),
            bytes_read:  self.bytes_read.load(Ordering::Relaxed),
            decodes:     self.decodes.load(Ordering::Relaxed),
            open_time:   Duration::from_nanos(self.open_nanos.load(Ordering::Relaxed)),
            read_time:   Duration::from_nanos(self.read_nanos.load(Ordering::Relaxed)),
            decode_time: Duration::from_nanos(self.decode_nanos.load(Ordering::Relaxed)),
        }
    }
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl ReadObserver for ReadStats {
    fn on_open(&self, _path: &Path, elapsed: Duration) {
        self.opens.fetch_add(1, Ordering::Relaxed);
        self.open_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    fn on_read(&self, _path: &Path, bytes: u64, elapsed: Duration) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.read_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    fn on_decode(&self, _record_id: &str, elapsed: Duration) {
        self.decodes.fetch_add(1, Ordering::Relaxed);
        self.decode_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_accumulate() {
        let stats = ReadStats::new();
        stats.on_open(Path::new("g0"), Duration::from_micros(3));
        stats.on_read(Path::new("g0"), 400, Duration::from_micros(10));
        stats.on_read(Path::new("g1"), 100, Duration::from_micros(5));
        stats.on_decode("img0", Duration::from_micros(1));

        let snap = stats.snapshot();
        assert_eq!((snap.opens, snap.reads, snap.bytes_read, snap.decodes), (1, 2, 500, 1));
        assert_eq!(snap.read_time, Duration::from_micros(15));
    }
}
