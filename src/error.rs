use thiserror::Error;

use crate::config::ConfigError;
use crate::decode::BoxError;
use crate::index::MetadataError;
use crate::pack::PackError;
use crate::reader::ReadError;

/// Crate-level error: everything [`GroupDataset`](crate::dataset::GroupDataset)
/// can return.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("target transform failed for class {class_index}: {source}")]
    TargetTransform { class_index: usize, source: BoxError },
}

impl From<PackError> for Error {
    fn from(e: PackError) -> Self { Error::Read(ReadError::Range(e)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
