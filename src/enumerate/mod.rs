//! Candidate file discovery.
//!
//! Walks an export tree and lists files by extension without opening them.
//! Subtrees whose path (relative to the root) contains a blacklisted token
//! are pruned before they are descended into, which keeps scans of large
//! message archives cheap.

use crate::error::{IngestError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Blacklist applied when large subtrees are excluded.
pub const DEFAULT_BLACKLIST: &[&str] = &["messages"];

/// One candidate file: the directory holding it plus its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationEntry {
    /// Directory containing the file.
    pub dir: PathBuf,
    /// File name including extension.
    pub file_name: String,
}

impl EnumerationEntry {
    /// Full path of the file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// File name with the last extension stripped.
    ///
    /// This is the fallback dataset name for files that are not wrapped in a
    /// single top-level key.
    pub fn stem(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(idx) if idx > 0 => &self.file_name[..idx],
            _ => &self.file_name,
        }
    }
}

/// List files under `root` whose name ends with `.<extension>`.
///
/// Files are returned in traversal order. That order is whatever the
/// filesystem lists, stable for an unchanged tree but not sorted.
///
/// # Errors
///
/// Returns `IngestError::RootNotFound` if `root` is missing or is not a
/// directory. Unreadable entries below the root are logged and skipped.
pub fn enumerate_files(
    root: &Path,
    extension: &str,
    blacklist: &[String],
) -> Result<Vec<EnumerationEntry>> {
    if !root.is_dir() {
        return Err(IngestError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    log::debug!("BLACKLIST: (len: {}) {:?}", blacklist.len(), blacklist);
    let suffix = format!(".{}", extension);
    let mut entries = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            match blacklisted_by(root, entry.path(), blacklist) {
                Some(token) => {
                    log::debug!("denied by BL ({}): {}", token, entry.path().display());
                    false
                }
                None => true,
            }
        });

    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                log::warn!(
                    "{}",
                    IngestError::Walk {
                        path,
                        message: err.to_string(),
                    }
                );
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = match entry.file_name().to_str() {
            Some(name) => name,
            None => {
                log::warn!("Skipping non UTF-8 file name: {}", entry.path().display());
                continue;
            }
        };
        if !file_name.ends_with(&suffix) {
            continue;
        }

        let dir = entry
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        entries.push(EnumerationEntry {
            dir,
            file_name: file_name.to_string(),
        });
    }

    Ok(entries)
}

/// Return the first blacklist token contained in `dir`'s path relative to `root`.
fn blacklisted_by<'a>(root: &Path, dir: &Path, blacklist: &'a [String]) -> Option<&'a str> {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let relative = relative.to_string_lossy();
    if relative.is_empty() {
        return None;
    }
    blacklist
        .iter()
        .find(|token| !token.is_empty() && relative.contains(token.as_str()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    fn names(entries: &[EnumerationEntry]) -> Vec<String> {
        let mut names: Vec<String> = entries.iter().map(|e| e.file_name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_lists_matching_extension_recursively() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.json");
        touch(dir.path(), "nested/deeper/b.json");
        touch(dir.path(), "nested/notes.txt");
        touch(dir.path(), "c.json.bak");

        let entries = enumerate_files(dir.path(), "json", &[]).unwrap();
        assert_eq!(names(&entries), vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_blacklist_prunes_subtree() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "profile/profile.json");
        touch(dir.path(), "messages/inbox/alice/message_1.json");
        touch(dir.path(), "your_messages_archive/x.json");

        let blacklist = vec!["messages".to_string()];
        let entries = enumerate_files(dir.path(), "json", &blacklist).unwrap();
        assert_eq!(names(&entries), vec!["profile.json"]);
    }

    #[test]
    fn test_files_at_root_are_never_blacklisted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "messages.json");

        let blacklist = vec!["messages".to_string()];
        let entries = enumerate_files(dir.path(), "json", &blacklist).unwrap();
        assert_eq!(names(&entries), vec!["messages.json"]);
    }

    #[test]
    fn test_missing_root_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = enumerate_files(&dir.path().join("absent"), "json", &[]).unwrap_err();
        assert!(matches!(err, IngestError::RootNotFound { .. }));
    }

    #[test]
    fn test_custom_extension() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.geojson");
        touch(dir.path(), "b.json");
        let entries = enumerate_files(dir.path(), "geojson", &[]).unwrap();
        assert_eq!(names(&entries), vec!["a.geojson"]);
    }

    #[test]
    fn test_stem_strips_last_extension() {
        let entry = EnumerationEntry {
            dir: PathBuf::from("/x"),
            file_name: "your_topics.json".to_string(),
        };
        assert_eq!(entry.stem(), "your_topics");
        assert_eq!(entry.path(), PathBuf::from("/x/your_topics.json"));

        let dotfile = EnumerationEntry {
            dir: PathBuf::from("/x"),
            file_name: ".json".to_string(),
        };
        assert_eq!(dotfile.stem(), ".json");
    }
}
