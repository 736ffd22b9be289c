//! Integration tests for CLI wiring.
//!
//! These tests validate that the CLI is a thin adapter over the library
//! with proper error handling and exit codes.

#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::{Command, Output};
    use tempfile::TempDir;

    /// Get the path to the selfscape binary.
    fn get_selfscape_binary() -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_selfscape"))
    }

    fn export_dir() -> TempDir {
        let dir = TempDir::new().expect("Failed to create temp export");
        let topics = dir.path().join("your_topics");
        fs::create_dir_all(&topics).unwrap();
        fs::write(
            topics.join("your_topics.json"),
            json!({"topics_v2": [{"name": "Cats"}, {"name": "Dogs"}]}).to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("off_facebook_activity.json"),
            json!({"off_facebook_activity_v2": [
                {"name": "shop", "events": [{"id": 1, "type": "VIEW"}, {"id": 2, "type": "BUY"}]}
            ]})
            .to_string(),
        )
        .unwrap();
        dir
    }

    fn run(args: &[&str]) -> Output {
        Command::new(get_selfscape_binary())
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute selfscape")
    }

    fn path_arg(path: &Path) -> &str {
        path.to_str().expect("temp path is not UTF-8")
    }

    /// Test A: successful run into a private temp directory.
    #[test]
    fn test_cli_successful_ingest() {
        let export = export_dir();
        let output = run(&["-i", path_arg(export.path())]);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
        assert!(stdout.contains("DATASETS:"), "{}", stdout);
        assert!(stdout.contains("topics_v2:\n  shape: (2, 1)"), "{}", stdout);
        assert!(stdout.contains("off_facebook_activity_v2:\n  shape: (2, 3)"), "{}", stdout);
        assert!(stdout.contains("2 datasets from 2 of 2 files (0 skipped)"), "{}", stdout);
        assert!(!stdout.contains("artifacts:"), "{}", stdout);
    }

    /// Test B: a missing input root exits non-zero with an error message.
    #[test]
    fn test_cli_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let output = run(&["-i", path_arg(&missing)]);

        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Error:"), "{}", stderr);
        assert!(stderr.contains("nope"), "{}", stderr);
    }

    /// Test C: a caller-chosen output dir survives the run unless forced.
    #[test]
    fn test_cli_output_dir_kept_then_forced() {
        let export = export_dir();
        let out = TempDir::new().unwrap();
        let target = out.path().join("datasets");

        let output = run(&["-i", path_arg(export.path()), "-o", path_arg(&target)]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("artifacts:"), "{}", stdout);
        assert!(target.join("topics_v2.json").exists());
        assert!(target.join(".manifest.json").exists());

        let forced = out.path().join("forced");
        let output = run(&[
            "-i",
            path_arg(export.path()),
            "-o",
            path_arg(&forced),
            "--force-delete",
        ]);
        assert!(output.status.success());
        assert!(!forced.exists());
    }

    /// Test D: --describe appends key outlines.
    #[test]
    fn test_cli_describe() {
        let export = export_dir();
        let output = run(&["-i", path_arg(export.path()), "--describe"]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("topics_v2:\nname: string"), "{}", stdout);
    }

    /// Test E: an invalid config file is rejected before any work starts.
    #[test]
    fn test_cli_invalid_config() {
        let export = export_dir();
        let config = export.path().join("selfscape.conf");
        fs::write(&config, r#"{"wrkers": 2}"#).unwrap();

        let output = run(&["-i", path_arg(export.path()), "--config", path_arg(&config)]);
        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Error:"), "{}", stderr);
    }

    /// Test F: --log sends log lines to a file instead of stderr.
    #[test]
    fn test_cli_log_file() {
        let export = export_dir();
        let logs = TempDir::new().unwrap();
        let log_path = logs.path().join("selfscape.log");

        let output = run(&[
            "-i",
            path_arg(export.path()),
            "-v",
            "--no-progress",
            "--log",
            path_arg(&log_path),
        ]);
        assert!(output.status.success());

        let log = fs::read_to_string(&log_path).expect("log file written");
        assert!(log.contains("Ingest complete: 2 of 2 files read, 2 datasets"), "{}", log);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(!stderr.contains("Ingest complete"), "{}", stderr);
    }

    /// Test G: the input flag is mandatory.
    #[test]
    fn test_cli_requires_input() {
        let output = run(&[]);
        assert!(!output.status.success());
    }
}
