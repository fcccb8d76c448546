//! Batch reads across many flat indices.
//!
//! # Parallel reads
//!
//! [`read_packs_parallel`] reads a list of flat indices concurrently on the
//! Rayon pool when the `parallel` feature is enabled.  Each read opens its
//! own container handle, so reads of different groups never contend and
//! reads of the same group only share the page cache.
//!
//! Without the feature the same function runs sequentially and returns the
//! same result.  Output order always matches `flat_indices`.

use crate::dataset::read_flat;
use crate::error::Result;
use crate::index::MetadataIndex;
use crate::layout::PackLayout;
use crate::reader::{ContainerReader, RawRecord};

/// Read every index in `flat_indices`.
///
/// If any read fails, the first error (in request order) is returned and
/// the remaining results are discarded.
pub fn read_packs_parallel(
    reader:       &ContainerReader,
    index:        &MetadataIndex,
    layout:       PackLayout,
    flat_indices: &[usize],
) -> Result<Vec<Vec<RawRecord>>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        let results: Vec<Result<Vec<RawRecord>>> = flat_indices
            .par_iter()
            .map(|&i| read_flat(reader, index, layout, i))
            .collect();

        let mut out = Vec::with_capacity(results.len());
        for r in results {
            out.push(r?);
        }
        Ok(out)
    }

    #[cfg(not(feature = "parallel"))]
    {
        flat_indices
            .iter()
            .map(|&i| read_flat(reader, index, layout, i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ClassTable, Group, ImageRecord};
    use std::fs;

    fn fixture(dir: &std::path::Path) -> MetadataIndex {
        let classes = ClassTable::new(["cat"]);
        let groups = (0..3).map(|g| {
            let name = format!("g{g}");
            let payload: Vec<u8> = (0..8).map(|b| (g * 16 + b) as u8).collect();
            fs::write(dir.join(&name), &payload).unwrap();
            let records = (0..4u64).map(|r| ImageRecord {
                record_id:   format!("g{g}r{r}"),
                class_name:  "cat".into(),
                class_index: 0,
                start:       r * 2,
                size:        2,
            }).collect();
            Group { name, records }
        }).collect();
        MetadataIndex::new(classes, groups)
    }

    #[test]
    fn batch_matches_single_reads() {
        let dir = tempfile::tempdir().unwrap();
        let index = fixture(dir.path());
        let layout = PackLayout::new(4, 2).unwrap();
        let reader = ContainerReader::new(dir.path());

        let wanted = [5, 0, 3, 3];
        let batch = read_packs_parallel(&reader, &index, layout, &wanted).unwrap();
        for (&i, records) in wanted.iter().zip(&batch) {
            assert_eq!(records, &read_flat(&reader, &index, layout, i).unwrap());
        }
        assert_eq!(batch[0][1].record_id, "g2r3");
    }

    #[test]
    fn out_of_range_fails_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let index = fixture(dir.path());
        let layout = PackLayout::new(4, 2).unwrap();
        let reader = ContainerReader::new(dir.path());
        assert!(read_packs_parallel(&reader, &index, layout, &[0, 6]).is_err());
    }
}
