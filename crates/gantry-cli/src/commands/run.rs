//! Run command - execute a test package

use crate::console::ConsoleObserver;
use crate::manifest::ManifestFramework;
use crate::reporter::RunReporter;
use anyhow::{Context, Result};
use colored::*;
use gantry_engine::{
    LogSeverity, RunConfig, SessionManager, TestExecutionOptions, TestPackage, TestRunStatus,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the run command
pub struct RunArgs {
    /// Path to the package manifest
    pub package: PathBuf,
    /// Filter tests by name pattern
    pub filter: Option<String>,
    /// Show a line for every executed node
    pub verbose: bool,
    /// Output in JSON format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable the progress spinner
    pub no_progress: bool,
    /// Discover and walk the tree without executing tests
    pub dry_run: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            package: PathBuf::from("gantry.toml"),
            filter: None,
            verbose: false,
            json: false,
            no_color: false,
            no_progress: false,
            dry_run: false,
        }
    }
}

/// Run the run command
pub fn run(args: RunArgs) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let package = TestPackage::from_manifest(&args.package).with_context(|| {
        format!("failed to load package manifest {}", args.package.display())
    })?;

    let mut config = RunConfig::new(package)
        .with_framework(Arc::new(ManifestFramework))
        .with_execution(TestExecutionOptions {
            filter: args.filter.clone(),
            skip_execution: args.dry_run,
        });
    if !args.json && !args.no_progress {
        config = config.with_observer(Box::new(ConsoleObserver::new()));
    }

    let manager = SessionManager::new();
    let session = manager.open_session();
    let run = session.create_run(config)?;

    if !args.json {
        run.on_log_message(|event| {
            let prefix = match event.severity {
                LogSeverity::Error => "error".red().bold(),
                LogSeverity::Warning => "warning".yellow().bold(),
                LogSeverity::Info => "info".normal(),
            };
            eprintln!("{}: {}", prefix, event.message);
        });
    }

    // Ctrl-C cancels the run; the worker observes it at its next
    // checkpoint. The handler can only be installed once per process.
    let stopper = run.clone();
    let _ = ctrlc::set_handler(move || stopper.stop());

    run.start()?;
    run.wait_for_completion(None);

    let status = run.status();
    let report = run.report();

    if args.json {
        let value = serde_json::json!({
            "run_id": run.id(),
            "status": status,
            "report": &*report,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match status {
            TestRunStatus::Canceled => println!("{}", "Run canceled.".yellow().bold()),
            TestRunStatus::Error => {
                println!("{}", "Run aborted by an engine fault.".red().bold())
            }
            _ => {}
        }
        RunReporter::new(args.verbose)
            .with_no_color(args.no_color)
            .report(&report);
    }

    manager.close_session(session.id())?;

    if args.no_color {
        colored::control::unset_override();
    }

    // Exit 1 when anything failed or the run did not finish cleanly.
    if status != TestRunStatus::Finished || report.statistics.failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_package(dir: &std::path::Path, suite: &str) -> PathBuf {
        let tests = dir.join("tests");
        fs::create_dir(&tests).unwrap();
        fs::write(tests.join("suite.gantry.toml"), suite).unwrap();

        let manifest = dir.join("gantry.toml");
        fs::write(
            &manifest,
            "[package]\nname = \"demo\"\nroots = [\"tests\"]\n",
        )
        .unwrap();
        manifest
    }

    #[test]
    fn run_command_passing_suite() {
        let dir = tempdir().unwrap();
        let manifest = write_package(
            dir.path(),
            r#"
[suite]
name = "smoke"

[[fixture]]
name = "basics"

[[fixture.case]]
name = "works"
"#,
        );

        let args = RunArgs {
            package: manifest,
            verbose: true,
            no_color: true,
            no_progress: true,
            ..RunArgs::default()
        };
        assert!(run(args).is_ok());
    }

    #[test]
    fn run_command_empty_package() {
        let dir = tempdir().unwrap();
        let tests = dir.path().join("tests");
        fs::create_dir(&tests).unwrap();
        let manifest = dir.path().join("gantry.toml");
        fs::write(
            &manifest,
            "[package]\nname = \"empty\"\nroots = [\"tests\"]\n",
        )
        .unwrap();

        let args = RunArgs {
            package: manifest,
            no_color: true,
            no_progress: true,
            ..RunArgs::default()
        };
        assert!(run(args).is_ok());
    }

    #[test]
    fn run_command_missing_manifest() {
        let args = RunArgs {
            package: PathBuf::from("/nonexistent/gantry.toml"),
            no_color: true,
            no_progress: true,
            ..RunArgs::default()
        };
        assert!(run(args).is_err());
    }

    #[test]
    fn run_command_dry_run_ignores_failures() {
        let dir = tempdir().unwrap();
        let manifest = write_package(
            dir.path(),
            r#"
[suite]
name = "smoke"

[[fixture]]
name = "basics"

[[fixture.case]]
name = "would_fail"
outcome = "fail"
"#,
        );

        let args = RunArgs {
            package: manifest,
            dry_run: true,
            no_color: true,
            no_progress: true,
            ..RunArgs::default()
        };
        // The failing case never executes, so the command succeeds.
        assert!(run(args).is_ok());
    }
}
