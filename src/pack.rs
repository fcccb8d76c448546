//! Byte-window arithmetic for reading a pack (a contiguous run of records)
//! out of a group's container without touching the rest of the file.
//!
//! Both the blocking and the async reader go through [`PackRange::compute`];
//! only the I/O primitive differs between them, so their output cannot drift.

use thiserror::Error;

use crate::index::{Group, ImageRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error("pack size must be at least 1")]
    ZeroPackSize,
    #[error("pack size {pack_size} does not divide group '{group}' of {group_len} records")]
    Indivisible { group: String, group_len: usize, pack_size: usize },
    #[error("pack {pack_index} out of range for group '{group}' ({packs} packs)")]
    PackIndexOutOfRange { group: String, pack_index: usize, packs: usize },
    /// The record does not sit inside the window derived from the preceding
    /// record sizes, i.e. the container was not packed back to back.
    #[error("record '{record_id}' at {start}+{size} lies outside pack window {skip}+{read_len}")]
    RecordOutsideWindow {
        record_id: String,
        start:     u64,
        size:      u64,
        skip:      u64,
        read_len:  u64,
    },
    /// The summed record sizes before or inside the pack exceed `u64`.
    #[error("byte window of pack {pack_index} in group '{group}' overflows u64")]
    WindowOverflow { group: String, pack_index: usize },
}

/// The byte window of one pack and where each record sits inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackRange {
    /// Index of the pack's first record within the group.
    pub first_record:  usize,
    /// Bytes to skip from the start of the container.
    pub skip:          u64,
    /// Bytes to read after `skip`.
    pub read_len:      u64,
    /// `(offset, size)` of each record relative to the window, in record order.
    pub local_offsets: Vec<(u64, u64)>,
}

impl PackRange {
    /// Locate pack `pack_index` of `group` when the group is cut into packs
    /// of `pack_size` records.
    ///
    /// `skip` is the sum of the sizes of all records before the pack and
    /// `read_len` the sum of the pack's own sizes; local offsets are
    /// `start - skip`.
    pub fn compute(group: &Group, pack_size: usize, pack_index: usize) -> Result<Self, PackError> {
        if pack_size == 0 {
            return Err(PackError::ZeroPackSize);
        }
        let group_len = group.records.len();
        if group_len % pack_size != 0 {
            return Err(PackError::Indivisible {
                group: group.name.clone(),
                group_len,
                pack_size,
            });
        }
        let packs = group_len / pack_size;
        if pack_index >= packs {
            return Err(PackError::PackIndexOutOfRange {
                group: group.name.clone(),
                pack_index,
                packs,
            });
        }

        let first_record = pack_index * pack_size;
        let pack = &group.records[first_record..first_record + pack_size];
        let overflow = || PackError::WindowOverflow { group: group.name.clone(), pack_index };
        let skip = checked_size_sum(&group.records[..first_record]).ok_or_else(overflow)?;
        let read_len = checked_size_sum(pack)
            .filter(|len| skip.checked_add(*len).is_some())
            .ok_or_else(overflow)?;

        let local_offsets = pack.iter()
            .map(|r| local_offset(r, skip, read_len))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { first_record, skip, read_len, local_offsets })
    }

    /// Exclusive end of the window in container coordinates.
    pub fn window_end(&self) -> u64 { self.skip + self.read_len }

    /// The records this range covers.
    pub fn records<'g>(&self, group: &'g Group) -> &'g [ImageRecord] {
        &group.records[self.first_record..self.first_record + self.local_offsets.len()]
    }
}

/// Sum of record sizes, `None` on overflow.
pub(crate) fn checked_size_sum(records: &[ImageRecord]) -> Option<u64> {
    records.iter().try_fold(0u64, |acc, r| acc.checked_add(r.size))
}

fn local_offset(record: &ImageRecord, skip: u64, read_len: u64) -> Result<(u64, u64), PackError> {
    record.start
        .checked_sub(skip)
        .filter(|local| local.checked_add(record.size).is_some_and(|end| end <= read_len))
        .map(|local| (local, record.size))
        .ok_or_else(|| PackError::RecordOutsideWindow {
            record_id: record.record_id.clone(),
            start:     record.start,
            size:      record.size,
            skip,
            read_len,
        })
}
