//! Ingest options.
//!
//! Every tunable of a run lives in [`IngestOptions`]. Options can be built in
//! code or read from a JSON file; CLI flags are applied on top.

use crate::enumerate::DEFAULT_BLACKLIST;
use crate::error::{IngestError, Result};
use crate::telemetry::DEFAULT_MEMORY_WARN_BYTES;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-file flatten bound.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Where backing artifacts are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputTarget {
    /// A private temporary directory removed on close.
    #[default]
    Temp,
    /// A caller-chosen directory that outlives the reader.
    Dir(PathBuf),
}

impl From<String> for OutputTarget {
    fn from(value: String) -> Self {
        OutputTarget::from(value.as_str())
    }
}

impl From<&str> for OutputTarget {
    fn from(value: &str) -> Self {
        if value == "temp" {
            OutputTarget::Temp
        } else {
            OutputTarget::Dir(PathBuf::from(value))
        }
    }
}

impl From<OutputTarget> for String {
    fn from(value: OutputTarget) -> Self {
        match value {
            OutputTarget::Temp => "temp".to_string(),
            OutputTarget::Dir(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Options for one ingest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestOptions {
    /// Artifact destination.
    pub output: OutputTarget,
    /// Also read blacklisted subtrees (message archives).
    pub include_large_subtrees: bool,
    /// Directory path fragments skipped unless `include_large_subtrees`.
    pub blacklist: Vec<String>,
    /// File extension to ingest, without the dot.
    pub extension: String,
    /// Per-file flatten bound in milliseconds.
    pub timeout_ms: u64,
    /// Per-file heap peak that triggers a warning.
    pub memory_warn_bytes: u64,
    /// Reader threads; 1 reads sequentially.
    pub workers: usize,
    /// Dataset names kept as raw values instead of being flattened.
    pub structured: BTreeSet<String>,
    /// Draw progress bars on stderr while reading, merging and writing.
    pub progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            output: OutputTarget::Temp,
            include_large_subtrees: false,
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
            extension: "json".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            memory_warn_bytes: DEFAULT_MEMORY_WARN_BYTES,
            workers: 1,
            structured: BTreeSet::new(),
            progress: false,
        }
    }
}

impl IngestOptions {
    /// Load and validate options from a JSON file.
    ///
    /// Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| IngestError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let options: IngestOptions =
            serde_json::from_str(&content).map_err(|e| IngestError::InvalidConfig {
                message: format!("JSON parse error in {}: {}", path.display(), e),
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Reject options no run can use.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(IngestError::InvalidConfig {
                message: "'workers' must be at least 1".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(IngestError::InvalidConfig {
                message: "'timeout_ms' must be greater than 0".to_string(),
            });
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(IngestError::InvalidConfig {
                message: format!(
                    "'extension' must be a bare extension like \"json\", got {:?}",
                    self.extension
                ),
            });
        }
        Ok(())
    }

    /// Blacklist actually handed to the enumerator.
    pub fn effective_blacklist(&self) -> Vec<String> {
        if self.include_large_subtrees {
            Vec::new()
        } else {
            self.blacklist.clone()
        }
    }

    /// Per-file flatten bound.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the artifact destination.
    pub fn with_output(mut self, output: impl Into<OutputTarget>) -> Self {
        self.output = output.into();
        self
    }

    /// Read blacklisted subtrees too.
    pub fn with_large_subtrees(mut self, include: bool) -> Self {
        self.include_large_subtrees = include;
        self
    }

    /// Set the per-file flatten bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self
    }

    /// Set the reader thread count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Turn progress bars on or off.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Keep `name` as a structured dataset.
    pub fn with_structured(mut self, name: impl Into<String>) -> Self {
        self.structured.insert(name.into());
        self
    }
}

impl From<PathBuf> for OutputTarget {
    fn from(value: PathBuf) -> Self {
        OutputTarget::Dir(value)
    }
}

impl From<&Path> for OutputTarget {
    fn from(value: &Path) -> Self {
        OutputTarget::Dir(value.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let o = IngestOptions::default();
        assert_eq!(o.output, OutputTarget::Temp);
        assert_eq!(o.effective_blacklist(), vec!["messages".to_string()]);
        assert_eq!(o.timeout(), Duration::from_secs(60));
        assert_eq!(o.memory_warn_bytes, 4_000_000_000);
        assert!(!o.progress);
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_large_subtrees_clear_blacklist() {
        let o = IngestOptions::default().with_large_subtrees(true);
        assert!(o.effective_blacklist().is_empty());
    }

    #[test]
    fn test_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("opts.json");
        fs::write(
            &path,
            r#"{"output": "/tmp/out", "workers": 4, "structured": ["profile_v2"]}"#,
        )
        .unwrap();
        let o = IngestOptions::from_file(&path).unwrap();
        assert_eq!(o.output, OutputTarget::Dir(PathBuf::from("/tmp/out")));
        assert_eq!(o.workers, 4);
        assert!(o.structured.contains("profile_v2"));
        assert_eq!(o.extension, "json");
    }

    #[test]
    fn test_from_file_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("opts.json");
        fs::write(&path, r#"{"workers": 0}"#).unwrap();
        assert!(matches!(
            IngestOptions::from_file(&path),
            Err(IngestError::InvalidConfig { .. })
        ));

        fs::write(&path, r#"{"wrokers": 2}"#).unwrap();
        assert!(matches!(
            IngestOptions::from_file(&path),
            Err(IngestError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_with_timeout_clamps() {
        let o = IngestOptions::default().with_timeout(Duration::from_micros(10));
        assert_eq!(o.timeout_ms, 1);
        let o = IngestOptions::default().with_timeout(Duration::MAX);
        assert_eq!(o.timeout_ms, u64::MAX);
        let o = IngestOptions::default().with_timeout(Duration::from_secs(2));
        assert_eq!(o.timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_output_target_strings() {
        assert_eq!(OutputTarget::from("temp"), OutputTarget::Temp);
        assert_eq!(String::from(OutputTarget::Temp), "temp");
        assert_eq!(
            OutputTarget::from("out"),
            OutputTarget::Dir(PathBuf::from("out"))
        );
    }
}
