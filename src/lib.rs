pub mod config;
pub mod dataset;
pub mod decode;
pub mod error;
pub mod index;
pub mod layout;
pub mod metrics;
pub mod pack;
pub mod perf;
pub mod reader;

pub use config::{ConfigError, ContainerFormat, DatasetConfig};
pub use dataset::{Batch, GroupDataset};
pub use decode::{DecodePolicy, Decoder, RawDecoder};
pub use error::{Error, Result};
pub use index::{ClassTable, Group, ImageRecord, MetadataError, MetadataIndex};
pub use layout::{PackCoord, PackLayout};
pub use metrics::{NoopObserver, ReadObserver, ReadStats};
pub use pack::{PackError, PackRange};
pub use reader::{AsyncContainerReader, ContainerReader, RawRecord, ReadError};
