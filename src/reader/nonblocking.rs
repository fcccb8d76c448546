//! Tokio counterpart of [`ContainerReader`](super::ContainerReader).
//!
//! Suspends only while opening, seeking and reading.  Range computation,
//! slicing and the truncation checks are the same synchronous helpers the
//! blocking reader uses, so both return identical records for identical
//! coordinates.
//!
//! Dropping a pending future drops its buffer and its `tokio::fs::File`;
//! a cancelled read never leaks a handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::{check_window, io_error, slice_group, slice_pack, RawRecord, ReadError};
use crate::index::Group;
use crate::metrics::{NoopObserver, ReadObserver};
use crate::pack::PackRange;

#[derive(Clone)]
pub struct AsyncContainerReader {
    root:     PathBuf,
    observer: Arc<dyn ReadObserver>,
}

impl AsyncContainerReader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self::with_observer(root, Arc::new(NoopObserver))
    }

    pub fn with_observer<P: Into<PathBuf>>(root: P, observer: Arc<dyn ReadObserver>) -> Self {
        Self { root: root.into(), observer }
    }

    pub fn root(&self) -> &Path { &self.root }

    pub fn container_path(&self, group: &Group) -> PathBuf {
        self.root.join(&group.name)
    }

    pub async fn read_group(&self, group: &Group) -> Result<Vec<RawRecord>, ReadError> {
        let path = self.container_path(group);
        let mut file = self.open(&path).await?;

        let started = Instant::now();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.map_err(io_error(&path))?;
        self.observer.on_read(&path, buf.len() as u64, started.elapsed());
        debug!(group = %group.name, bytes = buf.len(), "async read group");

        slice_group(&path, group, Bytes::from(buf))
    }

    pub async fn read_pack(
        &self,
        group:      &Group,
        pack_size:  usize,
        pack_index: usize,
    ) -> Result<Vec<RawRecord>, ReadError> {
        let range = PackRange::compute(group, pack_size, pack_index)?;
        let path = self.container_path(group);
        let mut file = self.open(&path).await?;

        let file_len = file.metadata().await.map_err(io_error(&path))?.len();
        check_window(&path, &range, file_len)?;

        let started = Instant::now();
        file.seek(std::io::SeekFrom::Start(range.skip)).await.map_err(io_error(&path))?;
        let mut buf = Vec::with_capacity(range.read_len as usize);
        file.take(range.read_len).read_to_end(&mut buf).await.map_err(io_error(&path))?;
        self.observer.on_read(&path, buf.len() as u64, started.elapsed());
        debug!(
            group = %group.name,
            pack = pack_index,
            skip = range.skip,
            bytes = buf.len(),
            "async read pack"
        );

        slice_pack(&path, group, &range, Bytes::from(buf))
    }

    async fn open(&self, path: &Path) -> Result<File, ReadError> {
        let started = Instant::now();
        let file = File::open(path).await.map_err(io_error(path))?;
        self.observer.on_open(path, started.elapsed());
        Ok(file)
    }
}
