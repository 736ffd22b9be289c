//! Command-line interface for Selfscape.
//!
//! This module handles argument parsing and option merging only.
//! NO ingestion logic is performed here.

use crate::config::{IngestOptions, OutputTarget};
use crate::error::{IngestError, Result};
use clap::Parser;
use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

/// Selfscape: flatten a social-media data export into named datasets.
#[derive(Parser, Debug)]
#[command(name = "selfscape")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory of the JSON export.
    #[arg(short = 'i', long = "in-path", value_name = "PATH/TO/JSON_ROOT")]
    pub input: PathBuf,

    /// Where to write dataset artifacts ("temp" for a private temp directory).
    #[arg(short = 'o', long = "out-path", value_name = "DIR")]
    pub output: Option<String>,

    /// Don't skip the messages folder (may take significantly longer).
    #[arg(short = 'm', long = "include-large-subtrees")]
    pub include_large_subtrees: bool,

    /// Logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Append log output to this file instead of stderr.
    #[arg(short = 'l', long = "log", value_name = "PATH/TO/LOG")]
    pub log: Option<PathBuf>,

    /// Don't draw progress bars.
    #[arg(long)]
    pub no_progress: bool,

    /// Delete the output artifacts once the run finishes.
    #[arg(long)]
    pub force_delete: bool,

    /// JSON file with ingest options; flags override it.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Reader threads.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Per-file flatten bound in milliseconds.
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Also print each dataset's key outline.
    #[arg(long)]
    pub describe: bool,
}

impl Cli {
    /// Log level for the `-v` count.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Open the `--log` file for appending, if one was given.
    pub fn log_file(&self) -> Result<Option<File>> {
        let Some(path) = &self.log else {
            return Ok(None);
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| IngestError::Io {
                path: path.clone(),
                source: e,
            })?;
        Ok(Some(file))
    }

    /// Build the effective options: config file first, then flags.
    pub fn options(&self) -> Result<IngestOptions> {
        let mut options = match &self.config {
            Some(path) => IngestOptions::from_file(path)?,
            None => IngestOptions::default(),
        };
        if let Some(output) = &self.output {
            options.output = OutputTarget::from(output.as_str());
        }
        if self.include_large_subtrees {
            options.include_large_subtrees = true;
        }
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if let Some(ms) = self.timeout_ms {
            options = options.with_timeout(Duration::from_millis(ms));
        }
        options.progress = !self.no_progress;
        options.validate()?;
        Ok(options)
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
