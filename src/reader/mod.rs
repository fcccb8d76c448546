//! Container readers.
//!
//! # Full-group reads
//! The whole container is read into one buffer and every record is sliced
//! out of it.  The file must be at least as long as the furthest record end.
//!
//! # Pack reads
//! [`PackRange::compute`] yields the window `[skip, skip + read_len)`; only
//! that window is read and records are sliced at their local offsets.
//!
//! # Truncation
//! A container shorter than the metadata says is always an error
//! ([`ReadError::TruncatedContainer`]), never a short slice: a silently
//! shortened batch would misalign images and labels.
//!
//! Record slices are [`Bytes`] views into the single read buffer, so a
//! batch costs one allocation regardless of its record count.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use thiserror::Error;
use tracing::trace;

use crate::decode::BoxError;
use crate::index::Group;
use crate::pack::{PackError, PackRange};

pub mod blocking;
pub mod nonblocking;

pub use blocking::ContainerReader;
pub use nonblocking::AsyncContainerReader;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("container {} truncated: need {required} bytes, file has {actual}", path.display())]
    TruncatedContainer { path: PathBuf, required: u64, actual: u64 },
    /// The decoder rejected a record.  The batch it belongs to is aborted
    /// unless the caller asked for skip-and-continue.
    #[error("decode failed for record '{record_id}' (group '{group}', pack {pack_index}): {source}")]
    Decode {
        group:      String,
        pack_index: usize,
        record_id:  String,
        source:     BoxError,
    },
    #[error(transparent)]
    Range(#[from] PackError),
    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

// ── RawRecord ────────────────────────────────────────────────────────────────

/// Undecoded bytes of one record plus its label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub record_id:   String,
    pub class_index: usize,
    pub bytes:       Bytes,
}

// ── Shared slicing ───────────────────────────────────────────────────────────
//
// Everything below is synchronous and I/O free; the blocking and async
// readers differ only in how they fill the buffer.

pub(crate) fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ReadError + '_ {
    move |source| ReadError::Io { path: path.to_owned(), source }
}

/// Fail before reading when the file cannot hold the pack window.
pub(crate) fn check_window(path: &Path, range: &PackRange, file_len: u64) -> Result<(), ReadError> {
    if file_len < range.window_end() {
        return Err(ReadError::TruncatedContainer {
            path:     path.to_owned(),
            required: range.window_end(),
            actual:   file_len,
        });
    }
    Ok(())
}

pub(crate) fn slice_group(path: &Path, group: &Group, buf: Bytes) -> Result<Vec<RawRecord>, ReadError> {
    let required = group.extent();
    if (buf.len() as u64) < required {
        return Err(ReadError::TruncatedContainer {
            path:   path.to_owned(),
            required,
            actual: buf.len() as u64,
        });
    }

    Ok(group.records.iter().map(|r| {
        trace!(record = %r.record_id, start = r.start, size = r.size, "slice");
        RawRecord {
            record_id:   r.record_id.clone(),
            class_index: r.class_index,
            bytes:       buf.slice(r.start as usize..r.end() as usize),
        }
    }).collect())
}

pub(crate) fn slice_pack(
    path:  &Path,
    group: &Group,
    range: &PackRange,
    buf:   Bytes,
) -> Result<Vec<RawRecord>, ReadError> {
    if (buf.len() as u64) < range.read_len {
        return Err(ReadError::TruncatedContainer {
            path:     path.to_owned(),
            required: range.window_end(),
            actual:   range.skip + buf.len() as u64,
        });
    }

    Ok(range.records(group).iter().zip(&range.local_offsets).map(|(r, &(local, size))| {
        trace!(record = %r.record_id, local, size, "slice");
        RawRecord {
            record_id:   r.record_id.clone(),
            class_index: r.class_index,
            bytes:       buf.slice(local as usize..(local + size) as usize),
        }
    }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ImageRecord;

    fn group() -> Group {
        let records = (0..4u64).map(|i| ImageRecord {
            record_id:   format!("img{i}"),
            class_name:  "cat".into(),
            class_index: (i % 2) as usize,
            start:       i * 3,
            size:        3,
        }).collect();
        Group { name: "g0".into(), records }
    }

    #[test]
    fn group_slices_in_record_order() {
        let buf = Bytes::from_static(b"aaabbbcccddd");
        let out = slice_group(Path::new("g0"), &group(), buf).unwrap();
        let bytes: Vec<&[u8]> = out.iter().map(|r| r.bytes.as_ref()).collect();
        assert_eq!(bytes, [b"aaa", b"bbb", b"ccc", b"ddd"]);
        assert_eq!(out[3].class_index, 1);
    }

    #[test]
    fn short_group_buffer_is_truncation() {
        let buf = Bytes::from_static(b"aaabbbcccdd");
        match slice_group(Path::new("g0"), &group(), buf) {
            Err(ReadError::TruncatedContainer { required, actual, .. }) => {
                assert_eq!((required, actual), (12, 11));
            }
            other => panic!("expected truncation, got {other:?}"),
        }
    }

    #[test]
    fn pack_slices_use_local_offsets() {
        let g = group();
        let range = PackRange::compute(&g, 2, 1).unwrap();
        let out = slice_pack(Path::new("g0"), &g, &range, Bytes::from_static(b"cccddd")).unwrap();
        assert_eq!(out[0].record_id, "img2");
        assert_eq!(out[1].bytes.as_ref(), b"ddd");
    }

    #[test]
    fn short_window_is_truncation() {
        let g = group();
        let range = PackRange::compute(&g, 2, 1).unwrap();
        assert!(check_window(Path::new("g0"), &range, 11).is_err());
        assert!(check_window(Path::new("g0"), &range, 12).is_ok());
        assert!(matches!(
            slice_pack(Path::new("g0"), &g, &range, Bytes::from_static(b"cccdd")),
            Err(ReadError::TruncatedContainer { required: 12, actual: 11, .. })
        ));
    }
}
