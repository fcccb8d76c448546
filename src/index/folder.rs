//! Loose-file layout: `root/<class>/.../<image>`.
//!
//! Every image becomes a one-record group whose container is the image file
//! itself (`start = 0`, `size = file length`), so the grouped readers serve
//! this layout unchanged.  Classes are the sorted sub-directory names of the
//! root; files are visited in sorted path order.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::{ClassTable, Group, ImageRecord, MetadataError, MetadataIndex};

/// Extensions accepted by [`MetadataIndex::scan_folder`], compared
/// case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "ppm", "bmp", "pgm", "tif", "tiff", "webp",
];

impl MetadataIndex {
    /// Build an index from a class-per-directory tree.
    pub fn scan_folder<P: AsRef<Path>>(root: P) -> Result<Self, MetadataError> {
        let root = root.as_ref();

        let mut class_dirs = Vec::new();
        for entry in read_dir(root)? {
            let path = entry.path();
            if path.is_dir() {
                class_dirs.push(utf8_name(&path)?);
            }
        }
        let classes = ClassTable::new(class_dirs);

        let mut groups = Vec::new();
        for (class_index, class_name) in classes.iter() {
            let mut files = Vec::new();
            collect_files(&root.join(class_name), &mut files)?;
            files.sort();

            for path in files.into_iter().filter(|p| has_image_extension(p)) {
                let size = fs::metadata(&path)
                    .map_err(|source| MetadataError::Open { path: path.clone(), source })?
                    .len();
                let relative = path.strip_prefix(root).unwrap_or(&path);
                let name = relative.to_str()
                    .ok_or_else(|| MetadataError::NonUtf8Path { path: path.clone() })?
                    .to_owned();
                let record = ImageRecord {
                    record_id:   utf8_name(&path)?,
                    class_name:  class_name.to_owned(),
                    class_index,
                    start:       0,
                    size,
                };
                groups.push(Group { name, records: vec![record] });
            }
        }

        if groups.is_empty() {
            return Err(MetadataError::EmptyFolder { root: root.to_owned() });
        }
        info!(
            root = %root.display(),
            classes = classes.len(),
            files = groups.len(),
            "scanned image folder"
        );
        Ok(Self::new(classes, groups))
    }
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn read_dir(dir: &Path) -> Result<Vec<fs::DirEntry>, MetadataError> {
    let entries = fs::read_dir(dir)
        .map_err(|source| MetadataError::Open { path: dir.to_owned(), source })?;
    Ok(entries.collect::<Result<Vec<_>, _>>()?)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), MetadataError> {
    for entry in read_dir(dir)? {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

fn utf8_name(path: &Path) -> Result<String, MetadataError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| MetadataError::NonUtf8Path { path: path.to_owned() })
}
