//! Runs alone in its own binary: the descriptor count below is process-wide.
#![cfg(target_os = "linux")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use grouppack::index::MetadataIndex;
use grouppack::metrics::ReadStats;
use grouppack::reader::AsyncContainerReader;

use common::*;

fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

/// Blocking-pool work of a dropped read may finish a little later.
async fn settle_to(baseline: usize) -> usize {
    for _ in 0..200 {
        if open_fds() == baseline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    open_fds()
}

#[tokio::test]
async fn dropped_pack_read_releases_file_handle() {
    const RECORD: usize = 8 << 20;
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["cat", "dog"], &groups_with_sizes(1, 2, &[RECORD]));
    let index = MetadataIndex::load(dir.path(), 2).unwrap();
    let g0 = &index.groups()[0];
    let stats = Arc::new(ReadStats::new());
    let reader = AsyncContainerReader::with_observer(dir.path(), stats.clone());

    let baseline = open_fds();
    let mut read = Box::pin(reader.read_pack(g0, 2, 0));
    let mut finished = false;
    while stats.snapshot().opens == 0 {
        if tokio::time::timeout(Duration::ZERO, &mut read).await.is_ok() {
            finished = true;
            break;
        }
        tokio::task::yield_now().await;
    }
    if !finished {
        assert!(open_fds() > baseline, "container should be open mid-read");
    }
    drop(read);

    assert_eq!(settle_to(baseline).await, baseline);

    let records = reader.read_pack(g0, 2, 0).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].bytes, payload(0, 1, RECORD));
    assert_eq!(settle_to(baseline).await, baseline);
}
