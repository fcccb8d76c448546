#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// One record of a fixture group: id, class, payload.
pub type FixtureRecord = (String, String, Vec<u8>);

/// Deterministic payload that differs per group, record and position.
pub fn payload(group: usize, record: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| (group * 31 + record * 7 + i) as u8).collect()
}

/// Write `metadata.txt` and one back-to-back container per group.
pub fn write_dataset(dir: &Path, classes: &[&str], groups: &[(String, Vec<FixtureRecord>)]) {
    let mut meta = format!("{}\n", classes.len());
    for c in classes {
        meta.push_str(c);
        meta.push('\n');
    }
    for (name, records) in groups {
        meta.push_str(name);
        meta.push('\n');
        let mut container = Vec::new();
        for (id, class, bytes) in records {
            meta.push_str(&format!("{id},{class},{},{}\n", container.len(), bytes.len()));
            container.extend_from_slice(bytes);
        }
        fs::write(dir.join(name), container).unwrap();
    }
    fs::write(dir.join("metadata.txt"), meta).unwrap();
}

/// Groups of `group_size` records with the given sizes cycled, classes
/// alternating between `cat` and `dog`.
pub fn groups_with_sizes(group_count: usize, group_size: usize, sizes: &[usize]) -> Vec<(String, Vec<FixtureRecord>)> {
    (0..group_count).map(|g| {
        let records = (0..group_size).map(|r| {
            let class = if r % 2 == 0 { "cat" } else { "dog" };
            let len = sizes[(g + r) % sizes.len()];
            (format!("g{g}_img{r}"), class.to_string(), payload(g, r, len))
        }).collect();
        (format!("g{g}"), records)
    }).collect()
}

/// The canonical two-class fixture: group `g0` with four 100-byte records
/// at offsets 0, 100, 200, 300.
pub fn cat_dog_dataset() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path(), &["dog", "cat"], &groups_with_sizes(1, 4, &[100]));
    dir
}

/// Truncate a container file by `by` bytes.
pub fn truncate(path: &Path, by: u64) {
    let f = fs::OpenOptions::new().write(true).open(path).unwrap();
    let len = f.metadata().unwrap().len();
    f.set_len(len - by).unwrap();
}
