//! Read-only access to the datasets of a finished run.

use super::{IngestReport, Phase};
use crate::audit::Auditor;
use crate::dataset::{DatasetBody, LogicalDataset};
use crate::error::{IngestError, Result};
use crate::shape::outline;
use crate::store::ArtifactStore;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Lookup handle over materialized datasets.
///
/// Datasets are read back from their artifacts on every [`Reader::get`]. A
/// reader backed by a temporary directory deletes it on [`Reader::close`]
/// (or when dropped).
pub struct Reader {
    store: Option<ArtifactStore>,
    report: IngestReport,
    auditor: Auditor,
}

impl Reader {
    pub(crate) fn new(store: ArtifactStore, report: IngestReport, auditor: Auditor) -> Self {
        Self {
            store: Some(store),
            report,
            auditor,
        }
    }

    /// Reopen an output directory written by an earlier run.
    ///
    /// The reader owns nothing on disk: `close(false)` leaves the directory
    /// alone, `close(true)` deletes the artifacts.
    pub fn open(dir: &Path, auditor: Auditor) -> Result<Self> {
        let auditor = auditor.child("reader");
        let store = ArtifactStore::open(dir, auditor.child("store"))?;
        let report = IngestReport {
            datasets: store.manifest().datasets.len(),
            ..IngestReport::default()
        };
        auditor.info(format!(
            "Opened {} datasets from {}",
            report.datasets,
            dir.display()
        ));
        Ok(Self {
            store: Some(store),
            report,
            auditor,
        })
    }

    /// `Ready` until closed, then `Closed`.
    pub fn phase(&self) -> Phase {
        if self.store.is_some() {
            Phase::Ready
        } else {
            Phase::Closed
        }
    }

    /// True after [`Reader::close`].
    pub fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    /// What happened during ingestion. Empty counts for reopened readers.
    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    /// Directory holding the artifacts.
    pub fn dir(&self) -> Result<&Path> {
        Ok(self.store()?.dir())
    }

    /// Dataset names, in the order they were first encountered.
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.store()?.names())
    }

    /// True if a dataset called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.store
            .as_ref()
            .is_some_and(|store| store.entry(name).is_some())
    }

    /// Load one dataset.
    ///
    /// # Errors
    ///
    /// `IngestError::UnknownDataset` when no file produced `name` (callers
    /// are expected to catch this and skip whatever needed it),
    /// `IngestError::Closed` after close.
    pub fn get(&self, name: &str) -> Result<LogicalDataset> {
        self.store()?.read(name)
    }

    /// Shape and estimated in-memory size of one dataset.
    pub fn describe(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.describe())
    }

    /// Nested key outline of one dataset.
    ///
    /// Tables are outlined through their first row, structured datasets
    /// through their first value.
    pub fn outline(&self, name: &str) -> Result<String> {
        let dataset = self.get(name)?;
        let sample = match &dataset.body {
            DatasetBody::Table(table) => table.record(0).map(Value::Object),
            DatasetBody::Structured(values) => values.first().cloned(),
        };
        Ok(format!(
            "{}:{}",
            dataset.name,
            sample.as_ref().map(outline).unwrap_or_default()
        ))
    }

    /// Release the backing artifacts.
    ///
    /// Temporary storage is always deleted; a caller-chosen directory only
    /// when `force` is set. Closing twice is a no-op.
    pub fn close(&mut self, force: bool) -> Result<()> {
        let Some(mut store) = self.store.take() else {
            return Ok(());
        };
        let removed = store.remove(force)?;
        self.auditor.info(format!(
            "Reader closed ({})",
            if removed { "artifacts deleted" } else { "artifacts kept" }
        ));
        Ok(())
    }

    fn store(&self) -> Result<&ArtifactStore> {
        self.store.as_ref().ok_or(IngestError::Closed)
    }
}

impl fmt::Display for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--------")?;
        writeln!(f, "DATASETS:")?;
        match self.names() {
            Ok(names) => {
                for name in names {
                    match self.describe(&name) {
                        Ok(text) => writeln!(f, "{}", text)?,
                        Err(err) => writeln!(f, "{}: <unreadable: {}>", name, err)?,
                    }
                }
            }
            Err(err) => writeln!(f, "<{}>", err)?,
        }
        write!(f, "--------")
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("dir", &self.store.as_ref().map(|s| s.dir().to_path_buf()))
            .field("report", &self.report)
            .finish()
    }
}
