//! Map-style glue over the index, the resolver and the readers.
//!
//! ```no_run
//! use grouppack::config::DatasetConfig;
//! use grouppack::dataset::GroupDataset;
//! use grouppack::decode::RawDecoder;
//!
//! let config = DatasetConfig::new("/data/train", 64).with_read_group_size(16);
//! let dataset = GroupDataset::open(&config, RawDecoder)?;
//! for i in 0..dataset.len() {
//!     let batch = dataset.get(i)?;
//!     assert_eq!(batch.samples.len(), batch.targets.len());
//! }
//! # Ok::<(), grouppack::Error>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::config::DatasetConfig;
use crate::decode::{decode_records, BatchOrigin, BoxError, DecodePolicy, Decoder};
use crate::error::{Error, Result};
use crate::index::{Group, MetadataIndex};
use crate::layout::{PackCoord, PackLayout};
use crate::metrics::{NoopObserver, ReadObserver};
use crate::reader::{AsyncContainerReader, ContainerReader, RawRecord};

/// Maps a class index to the label handed to the caller.
pub type TargetTransform = Arc<dyn Fn(usize) -> Result<usize, BoxError> + Send + Sync>;

/// Decoded samples of one pack with their labels, position for position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    pub samples: Vec<T>,
    pub targets: Vec<usize>,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize { self.samples.len() }

    pub fn is_empty(&self) -> bool { self.samples.is_empty() }
}

pub struct GroupDataset<D: Decoder> {
    index:            Arc<MetadataIndex>,
    layout:           PackLayout,
    reader:           ContainerReader,
    async_reader:     AsyncContainerReader,
    decoder:          D,
    target_transform: Option<TargetTransform>,
    policy:           DecodePolicy,
    observer:         Arc<dyn ReadObserver>,
}

impl<D: Decoder> GroupDataset<D> {
    /// Validate `config`, then build the index.  A bad pack configuration
    /// fails before the metadata file is even opened.
    pub fn open(config: &DatasetConfig, decoder: D) -> Result<Self> {
        let layout = config.validate()?;
        let index = config.format.load_index(&config.root, layout.group_size())?;
        debug!(
            root = %config.root.display(),
            format = config.format.name(),
            packs_per_group = layout.packs_per_group(),
            "opened dataset"
        );
        Ok(Self::from_parts(config.root.clone(), Arc::new(index), layout, decoder))
    }

    /// Assemble a dataset around an index that is already built, e.g. one
    /// shared by several datasets with different pack sizes.
    pub fn from_parts<P: Into<PathBuf>>(
        root:    P,
        index:   Arc<MetadataIndex>,
        layout:  PackLayout,
        decoder: D,
    ) -> Self {
        let root = root.into();
        let observer: Arc<dyn ReadObserver> = Arc::new(NoopObserver);
        Self {
            index,
            layout,
            reader: ContainerReader::with_observer(root.clone(), observer.clone()),
            async_reader: AsyncContainerReader::with_observer(root, observer.clone()),
            decoder,
            target_transform: None,
            policy: DecodePolicy::default(),
            observer,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ReadObserver>) -> Self {
        self.reader = ContainerReader::with_observer(self.reader.root(), observer.clone());
        self.async_reader = AsyncContainerReader::with_observer(self.async_reader.root(), observer.clone());
        self.observer = observer;
        self
    }

    pub fn with_target_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(usize) -> Result<usize, BoxError> + Send + Sync + 'static,
    {
        self.target_transform = Some(Arc::new(transform));
        self
    }

    pub fn with_decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn index(&self) -> &MetadataIndex { &self.index }

    pub fn layout(&self) -> PackLayout { self.layout }

    pub fn reader(&self) -> &ContainerReader { &self.reader }

    pub fn async_reader(&self) -> &AsyncContainerReader { &self.async_reader }

    pub fn len(&self) -> usize {
        self.layout.total_len(self.index.groups().len())
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Undecoded records behind flat index `index`.
    pub fn read_raw(&self, index: usize) -> Result<Vec<RawRecord>> {
        read_flat(&self.reader, &self.index, self.layout, index)
    }

    pub async fn read_raw_async(&self, index: usize) -> Result<Vec<RawRecord>> {
        let (group, coord) = locate(&self.index, self.layout, index)?;
        self.read_located_async(group, coord).await
    }

    pub fn get(&self, index: usize) -> Result<Batch<D::Output>> {
        let (group, coord) = locate(&self.index, self.layout, index)?;
        let records = read_located(&self.reader, self.layout, group, coord)?;
        self.finish(group, coord, records)
    }

    pub async fn get_async(&self, index: usize) -> Result<Batch<D::Output>> {
        let (group, coord) = locate(&self.index, self.layout, index)?;
        let records = self.read_located_async(group, coord).await?;
        self.finish(group, coord, records)
    }

    /// Read many indices at once; see [`crate::perf::read_packs_parallel`].
    pub fn prefetch(&self, indices: &[usize]) -> Result<Vec<Vec<RawRecord>>> {
        crate::perf::read_packs_parallel(&self.reader, &self.index, self.layout, indices)
    }

    async fn read_located_async(&self, group: &Group, coord: PackCoord) -> Result<Vec<RawRecord>> {
        let records = if self.layout.is_full_group() {
            self.async_reader.read_group(group).await?
        } else {
            self.async_reader.read_pack(group, self.layout.pack_size(), coord.pack_index).await?
        };
        Ok(records)
    }

    fn finish(&self, group: &Group, coord: PackCoord, records: Vec<RawRecord>) -> Result<Batch<D::Output>> {
        let origin = BatchOrigin { group: &group.name, pack_index: coord.pack_index };
        let decoded = decode_records(records, &self.decoder, origin, self.policy, self.observer.as_ref())?;

        let mut samples = Vec::with_capacity(decoded.len());
        let mut targets = Vec::with_capacity(decoded.len());
        for (sample, class_index) in decoded {
            let target = match &self.target_transform {
                Some(transform) => transform(class_index)
                    .map_err(|source| Error::TargetTransform { class_index, source })?,
                None => class_index,
            };
            samples.push(sample);
            targets.push(target);
        }
        Ok(Batch { samples, targets })
    }
}

pub(crate) fn locate(index: &MetadataIndex, layout: PackLayout, flat_index: usize) -> Result<(&Group, PackCoord)> {
    let len = layout.total_len(index.groups().len());
    let coord = layout.resolve(flat_index);
    let group = index.group(coord.group_index)
        .ok_or(Error::IndexOutOfRange { index: flat_index, len })?;
    Ok((group, coord))
}

pub(crate) fn read_flat(
    reader:     &ContainerReader,
    index:      &MetadataIndex,
    layout:     PackLayout,
    flat_index: usize,
) -> Result<Vec<RawRecord>> {
    let (group, coord) = locate(index, layout, flat_index)?;
    read_located(reader, layout, group, coord)
}

fn read_located(
    reader: &ContainerReader,
    layout: PackLayout,
    group:  &Group,
    coord:  PackCoord,
) -> Result<Vec<RawRecord>> {
    let records = if layout.is_full_group() {
        reader.read_group(group)?
    } else {
        reader.read_pack(group, layout.pack_size(), coord.pack_index)?
    };
    Ok(records)
}
