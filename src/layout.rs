//! Flat sample index → (group, pack) coordinates.

use serde::Serialize;

use crate::config::ConfigError;

/// Validated grouping of a dataset: how many records a group holds and how
/// many of them one read returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackLayout {
    group_size:      usize,
    pack_size:       usize,
    packs_per_group: usize,
}

/// Position of one pack inside the container index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PackCoord {
    pub group_index: usize,
    pub pack_index:  usize,
}

impl PackLayout {
    /// `read_group_size == 0` means "read whole groups".
    pub fn new(group_size: usize, read_group_size: usize) -> Result<Self, ConfigError> {
        if group_size == 0 {
            return Err(ConfigError::ZeroGroupSize);
        }
        let pack_size = if read_group_size == 0 { group_size } else { read_group_size };
        if group_size % pack_size != 0 {
            return Err(ConfigError::InvalidPackConfiguration {
                group_size,
                read_group_size,
            });
        }
        Ok(Self { group_size, pack_size, packs_per_group: group_size / pack_size })
    }

    pub fn group_size(&self) -> usize { self.group_size }

    pub fn pack_size(&self) -> usize { self.pack_size }

    pub fn packs_per_group(&self) -> usize { self.packs_per_group }

    /// One pack per group: reads materialize entire containers.
    pub fn is_full_group(&self) -> bool { self.packs_per_group == 1 }

    #[inline]
    pub fn resolve(&self, flat_index: usize) -> PackCoord {
        PackCoord {
            group_index: flat_index / self.packs_per_group,
            pack_index:  flat_index % self.packs_per_group,
        }
    }

    #[inline]
    pub fn flat_index(&self, coord: PackCoord) -> usize {
        coord.group_index * self.packs_per_group + coord.pack_index
    }

    /// Dataset length for an index holding `group_count` groups.
    pub fn total_len(&self, group_count: usize) -> usize {
        group_count * self.packs_per_group
    }
}
