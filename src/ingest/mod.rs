//! Export tree → named datasets ingestion pipeline.
//!
//! An [`Ingestor`] walks a JSON export, turns every file into a named
//! contribution (name resolution + flattening), merges contributions that
//! share a name, writes each merged dataset to the backing store and hands
//! back a [`Reader`].
//!
//! Per-file failures (unreadable file, malformed JSON, flatten timeout) are
//! logged and skipped. Only structural failures (missing root, store I/O)
//! abort a run.

pub mod reader;

pub use reader::Reader;

use crate::audit::Auditor;
use crate::config::IngestOptions;
use crate::dataset::{DatasetBody, LogicalDataset};
use crate::enumerate::{enumerate_files, EnumerationEntry};
use crate::error::{IngestError, Result};
use crate::flatten::{flatten_with_deadline, Deadline};
use crate::progress::Progress;
use crate::resolve::{resolve_name, split_payload};
use crate::shape::{classify, Shape};
use crate::store::ArtifactStore;
use crate::telemetry::Telemetry;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Lifecycle of one ingest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Configured, nothing done yet.
    Created,
    /// Listing candidate files.
    Enumerating,
    /// Parsing and flattening files.
    Reading,
    /// Combining contributions by name.
    Merging,
    /// Writing artifacts.
    Materializing,
    /// Datasets available through the reader.
    Ready,
    /// Artifacts released.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Created => "created",
            Phase::Enumerating => "enumerating",
            Phase::Reading => "reading",
            Phase::Merging => "merging",
            Phase::Materializing => "materializing",
            Phase::Ready => "ready",
            Phase::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// One file's share of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    /// Resolved dataset name.
    pub name: String,
    /// Flattened rows or the raw payload.
    pub body: DatasetBody,
    /// File it came from.
    pub source: PathBuf,
}

/// A file that did not contribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// The file.
    pub path: PathBuf,
    /// Short reason label (`parse`, `timeout`, `io`).
    pub reason: &'static str,
    /// Full error message.
    pub message: String,
}

/// Outcome counts of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Candidate files found by enumeration.
    pub files_found: usize,
    /// Files that contributed to a dataset.
    pub files_read: usize,
    /// Files that were skipped, in enumeration order.
    pub skipped: Vec<SkippedFile>,
    /// Datasets produced.
    pub datasets: usize,
}

impl IngestReport {
    /// Skip counts grouped by reason.
    pub fn skipped_by_reason(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for skip in &self.skipped {
            *counts.entry(skip.reason).or_insert(0) += 1;
        }
        counts
    }
}

/// Drives one ingest run.
pub struct Ingestor {
    options: IngestOptions,
    auditor: Auditor,
    telemetry: Telemetry,
    phase: Phase,
}

impl Ingestor {
    /// Create an ingestor. Options are validated here.
    pub fn new(options: IngestOptions, auditor: Auditor) -> Result<Self> {
        options.validate()?;
        let auditor = auditor.child("ingest");
        let telemetry = Telemetry::new(auditor.child("telemetry"), options.memory_warn_bytes);
        Ok(Self {
            options,
            auditor,
            telemetry,
            phase: Phase::Created,
        })
    }

    /// Ingest everything under `json_root`.
    ///
    /// # Errors
    ///
    /// `IngestError::RootNotFound` if the root is missing, I/O errors from
    /// the backing store, `IngestError::Other` if the worker pool cannot be
    /// built. Per-file problems never surface here; see
    /// [`Reader::report`].
    pub fn run(mut self, json_root: &Path) -> Result<Reader> {
        self.auditor.info(format!(
            "Starting JSON ingest: json path: {}, dest: {:?}, skip large subtrees: {}",
            json_root.display(),
            self.options.output,
            !self.options.include_large_subtrees
        ));

        // Step 1: Enumerate
        self.enter(Phase::Enumerating);
        let blacklist = self.options.effective_blacklist();
        let measured = self.telemetry.track("Enumerated files", || {
            enumerate_files(json_root, &self.options.extension, &blacklist)
        });
        let elapsed_ms = measured.elapsed_ms();
        let entries = measured.value?;
        self.auditor
            .info(format!("Enumerated {} files in {:.3} ms", entries.len(), elapsed_ms));

        // Step 2: Read every file
        self.enter(Phase::Reading);
        let outcomes = self.read_all(&entries)?;

        // Step 3: Merge in enumeration order
        self.enter(Phase::Merging);
        let mut report = IngestReport {
            files_found: entries.len(),
            ..IngestReport::default()
        };
        let progress =
            Progress::bar(self.options.progress, outcomes.len() as u64, "building datasets");
        let datasets = merge(outcomes, &mut report, &self.auditor, &progress);
        progress.finish();
        report.datasets = datasets.len();

        // Step 4: Materialize
        self.enter(Phase::Materializing);
        let mut store = ArtifactStore::create(&self.options.output, self.auditor.child("store"))?;
        let progress =
            Progress::bar(self.options.progress, datasets.len() as u64, "writing artifacts");
        for dataset in &datasets {
            store.write(dataset)?;
            progress.inc(1);
        }
        progress.finish();
        store.finalize()?;

        self.enter(Phase::Ready);
        self.log_summary(&report);
        Ok(Reader::new(store, report, self.auditor.clone()))
    }

    fn enter(&mut self, phase: Phase) {
        self.auditor.debug(format!("{} -> {}", self.phase, phase));
        self.phase = phase;
    }

    fn read_all(
        &self,
        entries: &[EnumerationEntry],
    ) -> Result<Vec<(PathBuf, Result<Contribution>)>> {
        let progress =
            Progress::bar(self.options.progress, entries.len() as u64, "reading json");
        let work = |entry: &EnumerationEntry| {
            let path = entry.path();
            let label = format!("Processed {}", entry.file_name);
            let measured = self
                .telemetry
                .track(&label, || read_file(entry, &self.options, &self.auditor));
            progress.inc(1);
            (path, measured.value)
        };

        if self.options.workers <= 1 {
            let outcomes: Vec<_> = entries.iter().map(work).collect();
            progress.finish();
            return Ok(outcomes);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .thread_name(|i| format!("selfscape-reader-{}", i))
            .build()
            .map_err(|e| IngestError::Other(format!("Failed to start worker pool: {}", e)))?;
        // `collect` on an indexed parallel iterator keeps enumeration order.
        let outcomes: Vec<_> = pool.install(|| entries.par_iter().map(work).collect());
        progress.finish();
        Ok(outcomes)
    }

    fn log_summary(&self, report: &IngestReport) {
        self.auditor.info(format!(
            "Ingest complete: {} of {} files read, {} datasets",
            report.files_read, report.files_found, report.datasets
        ));
        if !report.skipped.is_empty() {
            let reasons: Vec<String> = report
                .skipped_by_reason()
                .iter()
                .map(|(reason, count)| format!("{} {}", count, reason))
                .collect();
            self.auditor.warn(format!(
                "Skipped {} files ({})",
                report.skipped.len(),
                reasons.join(", ")
            ));
        }
    }
}

/// Ingest `json_root` with `options`; shorthand for [`Ingestor::run`].
pub fn ingest(json_root: &Path, options: IngestOptions, auditor: Auditor) -> Result<Reader> {
    Ingestor::new(options, auditor)?.run(json_root)
}

/// Parse, name and flatten one file.
///
/// The flatten step runs under `options.timeout()`, measured from the end of
/// parsing.
pub fn read_file(
    entry: &EnumerationEntry,
    options: &IngestOptions,
    auditor: &Auditor,
) -> Result<Contribution> {
    let path = entry.path();
    let bytes = fs::read(&path).map_err(|e| IngestError::Io {
        path: path.clone(),
        source: e,
    })?;
    auditor.file_read(&path);
    auditor.debug(format!(
        "Processing {:.3}MB file: {}",
        bytes.len() as f64 * 1e-6,
        path.display()
    ));

    let root: Value = serde_json::from_slice(&bytes).map_err(|e| IngestError::Parse {
        file: path.clone(),
        message: e.to_string(),
    })?;
    drop(bytes);

    contribution_from_value(root, entry.stem(), options, &path)
}

/// Turn an already parsed file into its contribution.
pub fn contribution_from_value(
    root: Value,
    fallback_name: &str,
    options: &IngestOptions,
    source: &Path,
) -> Result<Contribution> {
    // The cookie jar is recognized on the whole file, wrapper key included.
    let (name, payload) = if classify(&root) == Shape::CookieJar {
        (resolve_name(&root, fallback_name), root)
    } else {
        split_payload(root, fallback_name)
    };

    let body = if options.structured.contains(&name) {
        DatasetBody::Structured(vec![payload])
    } else {
        let deadline = Deadline::after(options.timeout());
        let table = flatten_with_deadline(&payload, &deadline).map_err(|e| IngestError::Timeout {
            file: source.to_path_buf(),
            limit: e.limit,
        })?;
        DatasetBody::Table(table)
    };

    Ok(Contribution {
        name,
        body,
        source: source.to_path_buf(),
    })
}

/// Fold per-file outcomes into datasets, first-seen name order.
fn merge(
    outcomes: Vec<(PathBuf, Result<Contribution>)>,
    report: &mut IngestReport,
    auditor: &Auditor,
    progress: &Progress,
) -> Vec<LogicalDataset> {
    let mut datasets: Vec<LogicalDataset> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (path, outcome) in outcomes {
        match outcome {
            Ok(contribution) => {
                report.files_read += 1;
                match by_name.get(&contribution.name) {
                    Some(&i) => datasets[i].merge(contribution.body),
                    None => {
                        by_name.insert(contribution.name.clone(), datasets.len());
                        datasets.push(LogicalDataset::new(contribution.name, contribution.body));
                    }
                }
            }
            Err(err) => {
                match &err {
                    IngestError::Timeout { file, .. } => auditor.error(format!(
                        "Processing file {} took too long. Skipping...",
                        file.display()
                    )),
                    other => auditor.error(format!("Skipping {}: {}", path.display(), other)),
                }
                report.skipped.push(SkippedFile {
                    path,
                    reason: err.reason(),
                    message: err.to_string(),
                });
            }
        }
        progress.inc(1);
    }
    datasets
}
