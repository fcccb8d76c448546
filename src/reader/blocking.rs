use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tracing::debug;

use super::{check_window, io_error, slice_group, slice_pack, RawRecord, ReadError};
use crate::index::Group;
use crate::metrics::{NoopObserver, ReadObserver};
use crate::pack::PackRange;

/// Blocking reader over the container files of one dataset root.
///
/// Holds no file handles between calls: every read opens its own handle and
/// drops it before returning, so one reader can serve any number of threads.
#[derive(Clone)]
pub struct ContainerReader {
    root:     PathBuf,
    observer: Arc<dyn ReadObserver>,
}

impl ContainerReader {
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

    /// Read a whole container and return every record in order.
    pub fn read_group(&self, group: &Group) -> Result<Vec<RawRecord>, ReadError> {
        let path = self.container_path(group);
        let mut file = self.open(&path)?;

        let started = Instant::now();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(io_error(&path))?;
        self.observer.on_read(&path, buf.len() as u64, started.elapsed());
        debug!(group = %group.name, bytes = buf.len(), "read group");

        slice_group(&path, group, Bytes::from(buf))
    }

    /// Read pack `pack_index` (packs of `pack_size` records) of a container.
    pub fn read_pack(
        &self,
        group:      &Group,
        pack_size:  usize,
        pack_index: usize,
    ) -> Result<Vec<RawRecord>, ReadError> {
        let range = PackRange::compute(group, pack_size, pack_index)?;
        let path = self.container_path(group);
        let mut file = self.open(&path)?;

        let file_len = file.metadata().map_err(io_error(&path))?.len();
        check_window(&path, &range, file_len)?;

        let started = Instant::now();
        file.seek(SeekFrom::Start(range.skip)).map_err(io_error(&path))?;
        let mut buf = Vec::with_capacity(range.read_len as usize);
        file.by_ref().take(range.read_len).read_to_end(&mut buf).map_err(io_error(&path))?;
        self.observer.on_read(&path, buf.len() as u64, started.elapsed());
        debug!(
            group = %group.name,
            pack = pack_index,
            skip = range.skip,
            bytes = buf.len(),
            "read pack"
        );

        slice_pack(&path, group, &range, Bytes::from(buf))
    }

    fn open(&self, path: &Path) -> Result<File, ReadError> {
        let started = Instant::now();
        let file = File::open(path).map_err(io_error(path))?;
        self.observer.on_open(path, started.elapsed());
        Ok(file)
    }
}
