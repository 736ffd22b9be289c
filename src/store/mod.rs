//! On-disk backing store for datasets.
//!
//! Each dataset is written as one JSON artifact, and a manifest tracks the
//! artifact file, kind, shape and SHA-256 of every dataset. The manifest is
//! what lets a later process reopen the directory without re-ingesting.
//!
//! ```text
//! <dir>/
//!   .manifest.json
//!   topics_v2.json
//!   off_facebook_activity_v2.json
//!   a_b-1f3c9e07.json        (name "a/b", sanitized + digest)
//! ```

pub mod artifact;

use crate::audit::Auditor;
use crate::config::OutputTarget;
use crate::dataset::LogicalDataset;
use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name of the manifest inside a store directory.
pub const MANIFEST_FILE: &str = ".manifest.json";

/// Manifest record for one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Dataset name.
    pub name: String,
    /// Artifact file name, relative to the store directory.
    pub file: String,
    /// `table` or `structured`.
    pub kind: String,
    /// Row (or value) count.
    pub rows: usize,
    /// Column count.
    pub columns: usize,
    /// SHA-256 of the artifact bytes.
    pub hash: String,
    /// Artifact size in bytes.
    pub size: u64,
}

/// Manifest describing one materialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreManifest {
    /// Unique identifier of the run that wrote the store.
    pub run_id: String,
    /// Creation time (RFC 3339).
    pub created: String,
    /// One entry per dataset, in materialization order.
    pub datasets: Vec<ManifestEntry>,
}

impl StoreManifest {
    fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            created: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            datasets: Vec::new(),
        }
    }
}

/// A directory of dataset artifacts plus its manifest.
pub struct ArtifactStore {
    dir: PathBuf,
    temp: Option<TempDir>,
    manifest: StoreManifest,
    index: HashMap<String, usize>,
    auditor: Auditor,
}

impl ArtifactStore {
    /// Prepare an empty store at `target`.
    ///
    /// `OutputTarget::Dir` is created if missing; `OutputTarget::Temp`
    /// allocates a private temporary directory.
    pub fn create(target: &OutputTarget, auditor: Auditor) -> Result<Self> {
        let (dir, temp) = match target {
            OutputTarget::Temp => {
                let temp = tempfile::Builder::new()
                    .prefix("selfscape-")
                    .tempdir()
                    .map_err(|e| IngestError::Io {
                        path: std::env::temp_dir(),
                        source: e,
                    })?;
                (temp.path().to_path_buf(), Some(temp))
            }
            OutputTarget::Dir(dir) => {
                fs::create_dir_all(dir).map_err(|e| IngestError::Io {
                    path: dir.clone(),
                    source: e,
                })?;
                (dir.clone(), None)
            }
        };
        auditor.debug(format!("Artifact store at {}", dir.display()));

        Ok(Self {
            dir,
            temp,
            manifest: StoreManifest::new(),
            index: HashMap::new(),
            auditor,
        })
    }

    /// Reopen a store written by an earlier run.
    pub fn open(dir: &Path, auditor: Auditor) -> Result<Self> {
        if !dir.is_dir() {
            return Err(IngestError::RootNotFound {
                path: dir.to_path_buf(),
            });
        }
        let manifest_path = dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&manifest_path).map_err(|e| IngestError::Io {
            path: manifest_path.clone(),
            source: e,
        })?;
        auditor.file_read(&manifest_path);

        let manifest: StoreManifest =
            serde_json::from_str(&json).map_err(|e| IngestError::Artifact {
                path: manifest_path.clone(),
                message: format!("Failed to parse manifest: {}", e),
            })?;
        let index = manifest
            .datasets
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.name.clone(), i))
            .collect();

        Ok(Self {
            dir: dir.to_path_buf(),
            temp: None,
            manifest,
            index,
            auditor,
        })
    }

    /// Store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The manifest as written so far.
    pub fn manifest(&self) -> &StoreManifest {
        &self.manifest
    }

    /// Dataset names in materialization order.
    pub fn names(&self) -> Vec<String> {
        self.manifest.datasets.iter().map(|e| e.name.clone()).collect()
    }

    /// Manifest entry for `name`.
    pub fn entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.index.get(name).map(|&i| &self.manifest.datasets[i])
    }

    /// Write one dataset's artifact and record it in the manifest.
    ///
    /// Writing a name twice replaces the earlier artifact.
    pub fn write(&mut self, dataset: &LogicalDataset) -> Result<&ManifestEntry> {
        let file = artifact_file_name(&dataset.name);
        let path = self.dir.join(&file);
        let bytes = artifact::encode(dataset).map_err(|message| IngestError::Artifact {
            path: path.clone(),
            message,
        })?;
        write_atomic(&path, &bytes)?;
        self.auditor.file_write(&path);

        let (rows, columns) = dataset.shape();
        let entry = ManifestEntry {
            name: dataset.name.clone(),
            file,
            kind: dataset.body.kind().to_string(),
            rows,
            columns,
            hash: compute_hash(&bytes),
            size: bytes.len() as u64,
        };

        let slot = match self.index.get(&dataset.name) {
            Some(&i) => {
                self.manifest.datasets[i] = entry;
                i
            }
            None => {
                self.manifest.datasets.push(entry);
                let i = self.manifest.datasets.len() - 1;
                self.index.insert(dataset.name.clone(), i);
                i
            }
        };
        Ok(&self.manifest.datasets[slot])
    }

    /// Write the manifest. Returns its path.
    pub fn finalize(&self) -> Result<PathBuf> {
        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_vec_pretty(&self.manifest).map_err(|e| IngestError::Artifact {
            path: path.clone(),
            message: format!("Failed to serialize manifest: {}", e),
        })?;
        write_atomic(&path, &json)?;
        self.auditor.file_write(&path);
        Ok(path)
    }

    /// Load a dataset back from its artifact, verifying its hash.
    pub fn read(&self, name: &str) -> Result<LogicalDataset> {
        let entry = self
            .entry(name)
            .ok_or_else(|| IngestError::UnknownDataset(name.to_string()))?;
        let path = self.dir.join(&entry.file);
        let bytes = fs::read(&path).map_err(|e| IngestError::Io {
            path: path.clone(),
            source: e,
        })?;
        self.auditor.file_read(&path);

        let actual = compute_hash(&bytes);
        if actual != entry.hash {
            return Err(IngestError::Artifact {
                path,
                message: format!("Hash mismatch: expected {}, got {}", entry.hash, actual),
            });
        }
        artifact::decode(&bytes).map_err(|message| IngestError::Artifact { path, message })
    }

    /// Delete what this store owns.
    ///
    /// A temporary store is always removed. A caller-chosen directory is only
    /// touched when `force` is set: its artifacts and manifest are deleted,
    /// then the directory itself if nothing else is left in it. Returns true
    /// if anything was deleted.
    pub fn remove(&mut self, force: bool) -> Result<bool> {
        if let Some(temp) = self.temp.take() {
            for entry in &self.manifest.datasets {
                self.auditor.file_delete(&self.dir.join(&entry.file));
            }
            temp.close().map_err(|e| IngestError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            self.auditor.file_delete(&self.dir);
            return Ok(true);
        }
        if !force {
            return Ok(false);
        }

        for entry in &self.manifest.datasets {
            let path = self.dir.join(&entry.file);
            remove_if_present(&path)?;
            self.auditor.file_delete(&path);
        }
        let manifest_path = self.dir.join(MANIFEST_FILE);
        remove_if_present(&manifest_path)?;
        self.auditor.file_delete(&manifest_path);

        if fs::remove_dir(&self.dir).is_ok() {
            self.auditor.file_delete(&self.dir);
        } else {
            self.auditor
                .debug(format!("Left non-empty directory {}", self.dir.display()));
        }
        Ok(true)
    }
}

/// Artifact file name for a dataset name.
///
/// Characters outside `[A-Za-z0-9._-]` and a leading dot become `_`. When
/// that changed anything, the first 8 hex digits of the name's SHA-256 are
/// appended so distinct names never share a file.
pub fn artifact_file_name(name: &str) -> String {
    let mut stem: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.starts_with('.') {
        stem.replace_range(..1, "_");
    }
    if stem != name || stem.is_empty() {
        let digest = compute_hash(name.as_bytes());
        stem.push('-');
        stem.push_str(&digest[..8]);
    }
    format!("{}.json", stem)
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| IngestError::Other("Artifact has no parent directory".to_string()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let temp_path = dir.join(format!(".{}.tmp", file_name));

    let io_err = |source| IngestError::Io {
        path: temp_path.clone(),
        source,
    };
    let mut temp_file = File::create(&temp_path).map_err(io_err)?;
    temp_file.write_all(content).map_err(io_err)?;
    temp_file.sync_all().map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(|e| IngestError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IngestError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Compute SHA-256 hash of bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditKind, MemorySink};
    use crate::dataset::{DatasetBody, Table};
    use serde_json::json;
    use std::sync::Arc;

    fn sample(name: &str) -> LogicalDataset {
        let mut t = Table::new();
        t.push_record([("a".to_string(), json!(1)), ("b".to_string(), json!("x"))]);
        t.push_record([("a".to_string(), json!(2.5))]);
        LogicalDataset::new(name, DatasetBody::Table(t))
    }

    #[test]
    fn test_file_names() {
        assert_eq!(artifact_file_name("topics_v2"), "topics_v2.json");
        let odd = artifact_file_name("a/b");
        assert!(odd.starts_with("a_b-") && odd.ends_with(".json"), "{}", odd);
        assert_ne!(artifact_file_name("a/b"), artifact_file_name("a:b"));
        assert!(artifact_file_name(".manifest").starts_with("_manifest-"));
        assert!(artifact_file_name("").starts_with('-'));
    }

    #[test]
    fn test_write_read_roundtrip_and_reopen() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let sink = Arc::new(MemorySink::new());
        let auditor = Auditor::new("t", sink.clone());

        let target = OutputTarget::Dir(out.clone());
        let mut store = ArtifactStore::create(&target, auditor.clone()).unwrap();
        let ds = sample("likes");
        let entry = store.write(&ds).unwrap().clone();
        assert_eq!(entry.rows, 2);
        assert_eq!(entry.columns, 2);
        store.finalize().unwrap();

        assert_eq!(store.read("likes").unwrap(), ds);
        assert!(matches!(store.read("nope"), Err(IngestError::UnknownDataset(_))));

        let reopened = ArtifactStore::open(&out, auditor).unwrap();
        assert_eq!(reopened.names(), vec!["likes".to_string()]);
        assert_eq!(reopened.read("likes").unwrap(), ds);
        assert_eq!(sink.count(AuditKind::FileWrite), 2);
    }

    #[test]
    fn test_tampered_artifact_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store =
            ArtifactStore::create(&OutputTarget::from(dir.path()), Auditor::default()).unwrap();
        store.write(&sample("x")).unwrap();
        fs::write(dir.path().join("x.json"), b"{}").unwrap();
        assert!(matches!(store.read("x"), Err(IngestError::Artifact { .. })));
    }

    #[test]
    fn test_temp_store_removed() {
        let mut store = ArtifactStore::create(&OutputTarget::Temp, Auditor::default()).unwrap();
        store.write(&sample("x")).unwrap();
        let dir = store.dir().to_path_buf();
        assert!(dir.join("x.json").exists());
        assert!(store.remove(false).unwrap());
        assert!(!dir.exists());
    }

    #[test]
    fn test_user_dir_kept_unless_forced() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let target = OutputTarget::Dir(out.clone());
        let mut store = ArtifactStore::create(&target, Auditor::default()).unwrap();
        store.write(&sample("x")).unwrap();
        store.finalize().unwrap();

        assert!(!store.remove(false).unwrap());
        assert!(out.join("x.json").exists());

        fs::write(out.join("keep.txt"), b"mine").unwrap();
        assert!(store.remove(true).unwrap());
        assert!(!out.join("x.json").exists());
        assert!(!out.join(MANIFEST_FILE).exists());
        assert!(out.join("keep.txt").exists());
    }

    #[test]
    fn test_open_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = ArtifactStore::open(&dir.path().join("none"), Auditor::default()).err().unwrap();
        assert!(err.is_not_found());
    }
}
