//! Read-only file system probes.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Existence, kind and mtime of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub mtime: SystemTime,
    pub kind: EntryKind,
}

impl Stat {
    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Stat a path. `None` when it doesn't exist or is neither file nor directory.
pub fn stat(path: &Path) -> Option<Stat> {
    let metadata = fs::metadata(path).ok()?;
    let kind = if metadata.is_file() {
        EntryKind::File
    } else if metadata.is_dir() {
        EntryKind::Dir
    } else {
        return None;
    };

    Some(Stat {
        mtime: metadata.modified().ok()?,
        kind,
    })
}

/// Immediate children of `dir`, sorted by name.
///
/// Hidden files (`.foo`), editor locks (`#foo`) and backups (`foo~`) are
/// skipped. A missing directory has no entries.
pub fn entries(dir: &Path) -> Vec<String> {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = read_dir
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !is_ignored(name))
        .collect();
    names.sort();
    names
}

fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('#') || name.ends_with('~')
}
