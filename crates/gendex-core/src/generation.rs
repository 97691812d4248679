//! File-level view of a generation: readability probe, slot clearing and
//! slot-to-slot copies.
//!
//! The engine's file names are opaque here. A slot "has index files" when it
//! holds at least one marker file and at least one segment file, both
//! recognised by name only.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMarkers {
    /// Exact file names that mark a committed generation.
    pub marker_files: Vec<String>,
    /// Extensions of segment files belonging to a generation.
    pub segment_extensions: Vec<String>,
}

impl Default for GenerationMarkers {
    fn default() -> Self {
        Self {
            marker_files: vec!["meta.json".to_string()],
            segment_extensions: vec!["store".to_string(), "idx".to_string(), "term".to_string()],
        }
    }
}

impl GenerationMarkers {
    pub fn is_marker(&self, name: &str) -> bool {
        self.marker_files.iter().any(|m| m == name)
    }

    pub fn is_segment(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.segment_extensions.iter().any(|s| s == ext))
    }

    /// True when `dir` holds a non-empty marker file and a segment file.
    pub fn has_index_files(&self, dir: &Path) -> bool {
        let Ok(entries) = fs::read_dir(dir) else { return false };
        let mut marker = false;
        let mut segment = false;
        for entry in entries.filter_map(|e| e.ok()) {
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if self.is_marker(name) && meta.len() > 0 {
                marker = true;
            } else if self.is_segment(name) {
                segment = true;
            }
            if marker && segment {
                return true;
            }
        }
        false
    }
}

/// Advisory and engine lock files never travel with a generation.
pub fn is_lock_file(name: &str) -> bool {
    name.ends_with(".lock")
}

/// Outcome of a multi-file copy. Per-file failures are collected rather
/// than aborting the copy.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub copied: usize,
    pub removed: usize,
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.copied + self.removed + self.failures.len()
    }

    fn fail(&mut self, path: PathBuf, err: io::Error) {
        warn!(path = %path.display(), error = %err, "file operation failed during slot sync");
        self.failures.push((path, err));
    }
}

/// Removes everything inside `dir` except lock files, keeping `dir` itself.
pub fn clear_slot(dir: &Path, report: &mut SyncReport) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return,
        Err(e) => return report.fail(dir.to_path_buf(), e),
    };
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report.fail(dir.to_path_buf(), e);
                continue;
            }
        };
        let path = entry.path();
        if entry.file_name().to_str().is_some_and(is_lock_file) {
            continue;
        }
        let result = match entry.file_type() {
            Ok(t) if t.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => report.removed += 1,
            Err(e) => report.fail(path, e),
        }
    }
}

/// Makes `to` a copy of `from`: clears `to`, then copies every non-lock file.
pub fn replace_slot_contents(from: &Path, to: &Path) -> SyncReport {
    let mut report = SyncReport::default();
    if let Err(e) = fs::create_dir_all(to) {
        report.fail(to.to_path_buf(), e);
        return report;
    }
    clear_slot(to, &mut report);
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| from.to_path_buf());
                report.fail(path, e.into());
                continue;
            }
        };
        if entry.file_name().to_str().is_some_and(is_lock_file) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(from) else { continue };
        let target = to.join(relative);
        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
        } else {
            fs::copy(entry.path(), &target).map(|_| ())
        };
        match result {
            Ok(()) if entry.file_type().is_file() => report.copied += 1,
            Ok(()) => {}
            Err(e) => report.fail(target, e),
        }
    }
    debug!(from = %from.display(), to = %to.display(), copied = report.copied, failed = report.failures.len(), "slot contents replaced");
    report
}

/// `(relative path, size)` of every non-lock file under `dir`, sorted.
pub fn file_manifest(dir: &Path) -> Vec<(PathBuf, u64)> {
    let mut files: Vec<(PathBuf, u64)> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.file_name().to_str().is_some_and(is_lock_file))
        .filter_map(|e| {
            let size = e.metadata().ok()?.len();
            let rel = e.path().strip_prefix(dir).ok()?.to_path_buf();
            Some((rel, size))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn probe_needs_marker_and_segment() {
        let tmp = TempDir::new().unwrap();
        let markers = GenerationMarkers::default();
        assert!(!markers.has_index_files(tmp.path()));

        fs::write(tmp.path().join("meta.json"), "{}").unwrap();
        assert!(!markers.has_index_files(tmp.path()));

        fs::write(tmp.path().join("0a1b.store"), b"seg").unwrap();
        assert!(markers.has_index_files(tmp.path()));
    }

    #[test]
    fn empty_marker_does_not_count() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("meta.json"), "").unwrap();
        fs::write(tmp.path().join("0a1b.idx"), b"seg").unwrap();
        assert!(!GenerationMarkers::default().has_index_files(tmp.path()));
    }

    #[test]
    fn replace_clears_target_and_skips_locks() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("Mirror");
        let to = tmp.path().join("A");
        fs::create_dir_all(&from).unwrap();
        fs::create_dir_all(&to).unwrap();
        fs::write(from.join("meta.json"), "{\"v\":2}").unwrap();
        fs::write(from.join("seg.store"), b"12345").unwrap();
        fs::write(from.join(".tantivy-writer.lock"), b"").unwrap();
        fs::write(to.join("stale.store"), b"old").unwrap();
        fs::write(to.join("write.lock"), b"held").unwrap();

        let report = replace_slot_contents(&from, &to);
        assert!(report.is_complete());
        assert_eq!(report.copied, 2);
        assert!(!to.join("stale.store").exists());
        assert!(to.join("write.lock").exists(), "a held marker survives clearing");
        assert!(!to.join(".tantivy-writer.lock").exists());
        assert_eq!(file_manifest(&from), file_manifest(&to));
    }
}
