//! Selfscape CLI binary
//!
//! Entry point for a standalone ingest run.
//! The CLI is a thin adapter over the library - NO logic is implemented here.

use selfscape::audit::Auditor;
use selfscape::config::OutputTarget;
use selfscape::telemetry::TrackingAllocator;
use std::process::ExitCode;

#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = selfscape::cli::parse_args();

    // Initialize logger at the requested verbosity, optionally into a file
    let mut logger = env_logger::Builder::new();
    logger.filter_level(cli.log_level()).parse_default_env();
    match cli.log_file() {
        Ok(Some(file)) => {
            logger.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    }
    logger.init();

    match run(&cli) {
        Ok(msg) => {
            println!("{}", msg);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Ingest, print the overview, then close.
fn run(cli: &selfscape::cli::Cli) -> Result<String, selfscape::IngestError> {
    let options = cli.options()?;
    let keeps_artifacts = matches!(options.output, OutputTarget::Dir(_)) && !cli.force_delete;
    let mut reader = selfscape::ingest(&cli.input, options, Auditor::default())?;

    let mut out = reader.to_string();
    if cli.describe {
        for name in reader.names()? {
            out.push('\n');
            out.push_str(&reader.outline(&name)?);
        }
    }

    let report = reader.report().clone();
    let location = reader.dir()?.display().to_string();
    reader.close(cli.force_delete)?;

    out.push_str(&format!(
        "\n{} datasets from {} of {} files ({} skipped)",
        report.datasets,
        report.files_read,
        report.files_found,
        report.skipped.len()
    ));
    if keeps_artifacts {
        out.push_str(&format!("\nartifacts: {}", location));
    }
    Ok(out)
}
