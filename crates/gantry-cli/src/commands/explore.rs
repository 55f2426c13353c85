//! Explore command - discover tests without running them

use crate::manifest::ManifestFramework;
use anyhow::{Context, Result};
use colored::*;
use gantry_engine::{
    ProgressMonitor, TestExplorationOptions, TestHarness, TestKind, TestNode, TestPackage,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments for the explore command
pub struct ExploreArgs {
    /// Path to the package manifest
    pub package: PathBuf,
    /// Output in JSON format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
}

impl Default for ExploreArgs {
    fn default() -> Self {
        Self {
            package: PathBuf::from("gantry.toml"),
            json: false,
            no_color: false,
        }
    }
}

/// Run the explore command
pub fn run(args: ExploreArgs) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let package = TestPackage::from_manifest(&args.package).with_context(|| {
        format!("failed to load package manifest {}", args.package.display())
    })?;

    let mut harness = TestHarness::new(vec![Arc::new(ManifestFramework)], Vec::new());
    harness.load(package, ProgressMonitor::new())?;
    harness.explore(&TestExplorationOptions::default(), ProgressMonitor::new())?;

    let model = harness
        .model()
        .context("exploration produced no test model")?;

    if args.json {
        let value = serde_json::json!({
            "test_count": model.test_count(),
            "tree": model.root(),
            "annotations": model.annotations(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let root = model.root();
        println!(
            "{} ({} test{})",
            root.name.bold(),
            model.test_count(),
            if model.test_count() == 1 { "" } else { "s" }
        );
        for child in &root.children {
            print_node(child, 1);
        }

        if !model.annotations().is_empty() {
            println!();
            println!("{}", "Annotations:".yellow().bold());
            for annotation in model.annotations() {
                println!("  {} {}", "●".yellow(), annotation.subject);
                println!("    {}", annotation.message.dimmed());
            }
        }
    }

    harness.unload()?;

    if args.no_color {
        colored::control::unset_override();
    }
    Ok(())
}

fn print_node(node: &TestNode, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = match node.kind {
        TestKind::Fixture => node.name.cyan().bold(),
        TestKind::Case => node.name.normal(),
        _ => node.name.bold(),
    };

    match &node.ignore_reason {
        Some(reason) => println!(
            "{}{} {}",
            indent,
            label,
            format!("(ignored: {})", reason).dimmed()
        ),
        None => println!("{}{}", indent, label),
    }

    for child in &node.children {
        print_node(child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn explore_command_lists_tests() {
        let dir = tempdir().unwrap();
        let tests = dir.path().join("tests");
        fs::create_dir(&tests).unwrap();
        fs::write(
            tests.join("suite.gantry.toml"),
            r#"
[suite]
name = "smoke"

[[fixture]]
name = "basics"

[[fixture.case]]
name = "works"
"#,
        )
        .unwrap();
        let manifest = dir.path().join("gantry.toml");
        fs::write(
            &manifest,
            "[package]\nname = \"demo\"\nroots = [\"tests\"]\n",
        )
        .unwrap();

        let args = ExploreArgs {
            package: manifest,
            no_color: true,
            ..ExploreArgs::default()
        };
        assert!(run(args).is_ok());
    }

    #[test]
    fn explore_command_missing_manifest() {
        let args = ExploreArgs {
            package: PathBuf::from("/nonexistent/gantry.toml"),
            no_color: true,
            ..ExploreArgs::default()
        };
        assert!(run(args).is_err());
    }
}
