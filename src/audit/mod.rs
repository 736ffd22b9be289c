//! Leveled logging plus an append-only audit trail.
//!
//! An [`Auditor`] is passed explicitly to everything that touches the
//! filesystem or the network. It forwards leveled messages to the `log`
//! facade under its own dotted name and records [`AuditEvent`]s into a
//! shared [`AuditSink`]. Children derived with [`Auditor::child`] share the
//! parent's sink, so one run produces one trail.

use chrono::{DateTime, Utc};
use log::Level;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Log target used by [`LogSink`].
pub const AUDIT_TARGET: &str = "audit";

/// Category of an audited access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuditKind {
    /// Contents of a file were read.
    FileRead,
    /// A file was written.
    FileWrite,
    /// A file or directory was removed.
    FileDelete,
    /// A remote URL was accessed.
    NetworkAccess,
}

impl AuditKind {
    /// Label used in audit lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::FileRead => "file-read",
            AuditKind::FileWrite => "file-write",
            AuditKind::FileDelete => "file-delete",
            AuditKind::NetworkAccess => "network-access",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audited access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// What kind of access happened.
    pub kind: AuditKind,
    /// Dotted name of the auditor that recorded it.
    pub source: String,
    /// Path or URL that was accessed.
    pub target: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

/// Destination for audit events.
///
/// Implementations must tolerate concurrent `record` calls from worker
/// threads; events are never read back by the ingest core.
pub trait AuditSink: Send + Sync {
    /// Append one event.
    fn record(&self, event: AuditEvent);
}

/// Writes audit events through the `log` facade on the [`AUDIT_TARGET`] target.
///
/// File accesses go out at info with the file name only, the full path
/// follows at debug. Network accesses are always warn.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn record(&self, event: AuditEvent) {
        match event.kind {
            AuditKind::NetworkAccess => {
                log::warn!(
                    target: AUDIT_TARGET,
                    "[INET] {} - Accessed URL: {}",
                    event.source,
                    event.target
                );
            }
            kind => {
                let short = Path::new(&event.target)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| event.target.clone());
                log::info!(
                    target: AUDIT_TARGET,
                    "[FILE I/O] {} - {}: {}",
                    event.source,
                    kind,
                    short
                );
                log::debug!(
                    target: AUDIT_TARGET,
                    "[FILE I/O] {} - Full path: {}",
                    event.source,
                    event.target
                );
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far, in arrival order.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of recorded events of one kind.
    pub fn count(&self, kind: AuditKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Targets of every event of one kind.
    pub fn targets(&self, kind: AuditKind) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.target.clone())
            .collect()
    }
}

impl AuditSink for MemorySink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

/// Fans every event out to several sinks.
pub struct TeeSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl TeeSink {
    /// Create a tee over the given sinks.
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for TeeSink {
    fn record(&self, event: AuditEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}

/// Named logging handle with audit recording.
#[derive(Clone)]
pub struct Auditor {
    name: String,
    sink: Arc<dyn AuditSink>,
}

impl fmt::Debug for Auditor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auditor").field("name", &self.name).finish()
    }
}

impl Default for Auditor {
    fn default() -> Self {
        Self::new("selfscape", Arc::new(LogSink))
    }
}

impl Auditor {
    /// Create a root auditor writing to `sink`.
    pub fn new(name: impl Into<String>, sink: Arc<dyn AuditSink>) -> Self {
        Self {
            name: name.into(),
            sink,
        }
    }

    /// Derive a child named `<parent>.<name>` that shares this sink.
    pub fn child(&self, name: &str) -> Self {
        Self {
            name: format!("{}.{}", self.name, name),
            sink: Arc::clone(&self.sink),
        }
    }

    /// Dotted name, also used as the log target.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Log at error level. Recoverable failures that impede functionality.
    pub fn error(&self, message: impl fmt::Display) {
        self.log(Level::Error, message);
    }

    /// Log at warn level.
    pub fn warn(&self, message: impl fmt::Display) {
        self.log(Level::Warn, message);
    }

    /// Log at info level.
    pub fn info(&self, message: impl fmt::Display) {
        self.log(Level::Info, message);
    }

    /// Log at debug level.
    pub fn debug(&self, message: impl fmt::Display) {
        self.log(Level::Debug, message);
    }

    /// Record that the contents of `path` were read.
    pub fn file_read(&self, path: &Path) {
        self.record(AuditKind::FileRead, path_target(path));
    }

    /// Record that `path` was written.
    pub fn file_write(&self, path: &Path) {
        self.record(AuditKind::FileWrite, path_target(path));
    }

    /// Record that `path` was removed.
    pub fn file_delete(&self, path: &Path) {
        self.record(AuditKind::FileDelete, path_target(path));
    }

    /// Record that `url` was fetched.
    pub fn network_access(&self, url: &str) {
        self.record(AuditKind::NetworkAccess, url.to_string());
    }

    fn log(&self, level: Level, message: impl fmt::Display) {
        log::log!(target: self.name.as_str(), level, "{}", message);
    }

    fn record(&self, kind: AuditKind, target: String) {
        self.sink.record(AuditEvent {
            kind,
            source: self.name.clone(),
            target,
            timestamp: Utc::now(),
        });
    }
}

fn path_target(path: &Path) -> String {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    absolute.display().to_string()
}
