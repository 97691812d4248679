//! Plain-text document source: every `.txt` file under a directory becomes
//! one record for the bulk writer.
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFile {
    pub path: String,
    pub category: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct TextDirectorySource {
    root: PathBuf,
    limit: Option<usize>,
}

impl TextDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), limit: None }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Reads the files in path order. Unreadable files are skipped.
    pub fn records(&self) -> Vec<TextFile> {
        let mut files = self.list_txt_files();
        if let Some(limit) = self.limit {
            files.truncate(limit);
        }
        let records: Vec<TextFile> = files
            .iter()
            .filter_map(|path| match read_file_content(path) {
                Ok(content) => Some(TextFile {
                    path: path.to_string_lossy().into_owned(),
                    category: category_from_path(path, &self.root),
                    content,
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    None
                }
            })
            .collect();
        debug!(root = %self.root.display(), files = records.len(), "text directory scanned");
        records
    }

    fn list_txt_files(&self) -> Vec<PathBuf> {
        let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
            .map(|e| e.into_path())
            .collect();
        txt_files.sort();
        txt_files
    }
}

fn read_file_content(path: &Path) -> std::io::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned()),
    }
}

/// `/topic/subtopic` from the file's parent directories, `/misc` at the top.
fn category_from_path(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parents: Vec<String> = relative
        .parent()
        .map(|p| p.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect())
        .unwrap_or_default();
    if parents.is_empty() {
        "/misc".to_string()
    } else {
        format!("/{}", parents.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn walks_txt_files_with_categories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("fire/craft")).unwrap();
        fs::write(tmp.path().join("fire/craft/flint.txt"), "strike the flint").unwrap();
        fs::write(tmp.path().join("loose.txt"), "top level").unwrap();
        fs::write(tmp.path().join("ignored.md"), "# nope").unwrap();

        let records = TextDirectorySource::new(tmp.path()).records();
        assert_eq!(records.len(), 2);
        let flint = records.iter().find(|r| r.path.ends_with("flint.txt")).unwrap();
        assert_eq!(flint.category, "/fire/craft");
        let loose = records.iter().find(|r| r.path.ends_with("loose.txt")).unwrap();
        assert_eq!(loose.category, "/misc");
    }

    #[test]
    fn limit_truncates_in_path_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        fs::write(tmp.path().join("b.txt"), "bravo").unwrap();
        let records = TextDirectorySource::new(tmp.path()).limit(1).records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "alpha");
    }
}
