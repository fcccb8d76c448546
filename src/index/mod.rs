//! Sidecar metadata index: classes, groups and per-record byte ranges.
//!
//! # Grammar
//! ```text
//! <class count C>
//! <class name>                             (C lines)
//! <group name>[,ignored...]
//! <record_id>,<class_name>,<start>,<size>  (group_size lines)
//! ...further group blocks...
//! <blank line or EOF>
//! ```
//!
//! Class indices follow sorted order, never file order.  Groups keep file
//! order: flat dataset indices map onto them positionally, so reordering
//! them would silently relabel every sample.
//!
//! The parser is deliberately permissive about things the packer never
//! promised: group names are not checked for uniqueness and there is no
//! declared group count to compare against.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub mod folder;

pub use folder::IMAGE_EXTENSIONS;

/// Name of the sidecar index inside a dataset root.
pub const METADATA_FILE: &str = "metadata.txt";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum MetadataError {
    /// Malformed header or record line, non-numeric field, or early EOF.
    #[error("metadata line {line}: {reason}")]
    Parse { line: usize, reason: String },
    /// A record names a class that the header never declared.
    #[error("metadata line {line}: record '{record_id}' names undeclared class '{class}'")]
    UnknownClass { line: usize, record_id: String, class: String },
    #[error("found 0 files in subfolders of {}", root.display())]
    EmptyFolder { root: PathBuf },
    #[error("path is not valid UTF-8: {}", path.display())]
    NonUtf8Path { path: PathBuf },
    #[error("cannot open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── ClassTable ───────────────────────────────────────────────────────────────

/// Sorted, de-duplicated class names with a name → index lookup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassTable {
    names:  Vec<String>,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl ClassTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        let lookup = names.iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, lookup }
    }

    pub fn len(&self) -> usize { self.names.len() }

    pub fn is_empty(&self) -> bool { self.names.is_empty() }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] { &self.names }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }
}

// ── Records and groups ───────────────────────────────────────────────────────

/// One image inside a container file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRecord {
    pub record_id:   String,
    pub class_name:  String,
    pub class_index: usize,
    /// Byte offset of the image inside its group's container file.
    pub start:       u64,
    /// Byte length of the image.
    pub size:        u64,
}

impl ImageRecord {
    /// Exclusive end offset.  `start + size` is checked at parse time.
    pub fn end(&self) -> u64 { self.start + self.size }
}

/// All records packed into one container file, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    /// Container file name, relative to the dataset root.
    pub name:    String,
    pub records: Vec<ImageRecord>,
}

impl Group {
    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Minimum container length that holds every record of the group.
    pub fn extent(&self) -> u64 {
        self.records.iter().map(ImageRecord::end).max().unwrap_or(0)
    }

    /// Sum of all record sizes, `None` if it does not fit in a `u64`.
    pub fn payload_len(&self) -> Option<u64> {
        crate::pack::checked_size_sum(&self.records)
    }
}

// ── MetadataIndex ────────────────────────────────────────────────────────────

/// Immutable description of a dataset root.  Built once, then shared
/// read-only (usually behind an `Arc`) by every reader.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataIndex {
    classes: ClassTable,
    groups:  Vec<Group>,
}

impl MetadataIndex {
    pub fn new(classes: ClassTable, groups: Vec<Group>) -> Self {
        Self { classes, groups }
    }

    /// Parse `root/metadata.txt`.
    pub fn load<P: AsRef<Path>>(root: P, group_size: usize) -> Result<Self, MetadataError> {
        let path = root.as_ref().join(METADATA_FILE);
        let file = File::open(&path)
            .map_err(|source| MetadataError::Open { path: path.clone(), source })?;
        let index = Self::from_reader(BufReader::new(file), group_size)?;
        info!(
            path = %path.display(),
            classes = index.classes.len(),
            groups = index.groups.len(),
            "loaded metadata index"
        );
        Ok(index)
    }

    /// Parse the metadata grammar from any buffered source.
    pub fn from_reader<R: BufRead>(reader: R, group_size: usize) -> Result<Self, MetadataError> {
        let mut cursor = LineCursor::new(reader);

        let (line, text) = cursor.expect("class count")?;
        let count: usize = text.trim().parse().map_err(|_| MetadataError::Parse {
            line,
            reason: format!("class count '{}' is not an integer", text.trim()),
        })?;

        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            let (_, text) = cursor.expect("class name")?;
            names.push(text.trim().to_owned());
        }
        let classes = ClassTable::new(names);
        debug!(classes = ?classes.names(), "class table");

        let mut groups = Vec::new();
        while let Some((_, text)) = cursor.next_line()? {
            let name = text.split(',').next().unwrap_or("").trim();
            if name.is_empty() {
                break;
            }
            let name = name.to_owned();

            let mut records = Vec::with_capacity(group_size);
            for parsed in 0..group_size {
                let (line, text) = cursor.next_line()?.ok_or_else(|| MetadataError::Parse {
                    line: cursor.line + 1,
                    reason: format!(
                        "group '{name}' ended after {parsed} of {group_size} records"
                    ),
                })?;
                records.push(parse_record(line, &text, &classes)?);
            }
            groups.push(Group { name, records });
        }

        Ok(Self { classes, groups })
    }

    pub fn classes(&self) -> &ClassTable { &self.classes }

    /// The container index: every group in file order.
    pub fn groups(&self) -> &[Group] { &self.groups }

    pub fn group(&self, index: usize) -> Option<&Group> { self.groups.get(index) }

    /// First group with this name.  Names are not guaranteed unique.
    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn total_records(&self) -> usize {
        self.groups.iter().map(Group::len).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ── Parsing helpers ──────────────────────────────────────────────────────────

struct LineCursor<R> {
    lines: io::Lines<R>,
    /// 1-based number of the last line returned.
    line:  usize,
}

impl<R: BufRead> LineCursor<R> {
    fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line: 0 }
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>, MetadataError> {
        match self.lines.next() {
            None => Ok(None),
            Some(text) => {
                self.line += 1;
                Ok(Some((self.line, text?)))
            }
        }
    }

    fn expect(&mut self, what: &str) -> Result<(usize, String), MetadataError> {
        let line = self.line + 1;
        self.next_line()?.ok_or_else(|| MetadataError::Parse {
            line,
            reason: format!("unexpected end of file, expected {what}"),
        })
    }
}

fn parse_record(line: usize, text: &str, classes: &ClassTable) -> Result<ImageRecord, MetadataError> {
    let fields: Vec<&str> = text.trim().split(',').collect();
    if fields.len() < 4 {
        return Err(MetadataError::Parse {
            line,
            reason: format!("expected record_id,class_name,start,size but found '{}'", text.trim()),
        });
    }

    let record_id = fields[0].trim().to_owned();
    let class_name = fields[1].trim().to_owned();
    let start = parse_u64(line, "start", fields[2])?;
    let size = parse_u64(line, "size", fields[3])?;
    if start.checked_add(size).is_none() {
        return Err(MetadataError::Parse {
            line,
            reason: format!("range {start}+{size} overflows a 64-bit offset"),
        });
    }

    let class_index = classes.index_of(&class_name).ok_or_else(|| MetadataError::UnknownClass {
        line,
        record_id: record_id.clone(),
        class: class_name.clone(),
    })?;

    Ok(ImageRecord { record_id, class_name, class_index, start, size })
}

fn parse_u64(line: usize, field: &str, raw: &str) -> Result<u64, MetadataError> {
    raw.trim().parse().map_err(|_| MetadataError::Parse {
        line,
        reason: format!("{field} '{}' is not a non-negative integer", raw.trim()),
    })
}
