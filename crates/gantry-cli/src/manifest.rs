//! The suite-manifest framework adapter
//!
//! Discovers `*.gantry.toml` suite files under a package's artifact
//! paths and builds pattern tests from them. A suite file declares
//! fixtures and cases with scripted outcomes; it is the stock adapter
//! the CLI plugs into the engine, and doubles as a reference for
//! writing real framework adapters.

use gantry_engine::{
    EngineResult, Fault, FaultKind, PatternTest, PatternTestBuilder, TestArtifact, TestExplorer,
    TestFramework, TreeBuilder,
};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

const SUITE_SUFFIX: &str = ".gantry.toml";

#[derive(Debug, Deserialize)]
struct SuiteFile {
    suite: SuiteSection,
    #[serde(default, rename = "fixture")]
    fixtures: Vec<FixtureSpec>,
}

#[derive(Debug, Deserialize)]
struct SuiteSection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FixtureSpec {
    name: String,
    /// Exclude the whole fixture, recording this reason
    #[serde(default)]
    ignore: Option<String>,
    /// Make the fixture's set-up fail with this message
    #[serde(default)]
    set_up_fault: Option<String>,
    /// Make the fixture's tear-down fail with this message
    #[serde(default)]
    tear_down_fault: Option<String>,
    #[serde(default, rename = "case")]
    cases: Vec<CaseSpec>,
}

#[derive(Debug, Deserialize)]
struct CaseSpec {
    name: String,
    #[serde(default)]
    outcome: CaseOutcome,
    /// Fault message for failing cases, reason for ignored ones
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CaseOutcome {
    #[default]
    Pass,
    Fail,
    Ignore,
    Pending,
}

/// Test framework backed by suite-manifest files
#[derive(Debug, Default)]
pub struct ManifestFramework;

impl TestFramework for ManifestFramework {
    fn name(&self) -> &str {
        "manifest"
    }

    fn create_explorer(&self) -> Box<dyn TestExplorer> {
        Box::new(ManifestExplorer)
    }
}

struct ManifestExplorer;

impl TestExplorer for ManifestExplorer {
    fn explore_artifact(
        &mut self,
        artifact: &TestArtifact,
        builder: &mut TreeBuilder<'_>,
    ) -> EngineResult<()> {
        for path in suite_files(&artifact.path) {
            match parse_suite(&path) {
                Ok(suite) => builder.attach(suite),
                // A malformed suite file annotates the artifact;
                // sibling files keep loading.
                Err(message) => builder.annotate(path.display().to_string(), message),
            }
        }
        Ok(())
    }
}

fn suite_files(root: &Path) -> Vec<std::path::PathBuf> {
    if root.is_file() {
        return if is_suite_file(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        };
    }

    let mut files: Vec<_> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && is_suite_file(path))
        .collect();
    files.sort();
    files
}

fn is_suite_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(SUITE_SUFFIX))
}

fn parse_suite(path: &Path) -> Result<PatternTest, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("failed to read suite: {}", e))?;
    let file: SuiteFile =
        toml::from_str(&text).map_err(|e| format!("invalid suite file: {}", e))?;

    let mut suite = PatternTestBuilder::group(&file.suite.name);
    for fixture in &file.fixtures {
        suite.add_child(build_fixture(fixture));
    }
    Ok(suite.build())
}

fn build_fixture(spec: &FixtureSpec) -> PatternTest {
    let mut fixture = PatternTestBuilder::fixture(&spec.name);
    if let Some(reason) = &spec.ignore {
        fixture.set_ignore(reason);
    }
    if let Some(message) = &spec.set_up_fault {
        let message = message.clone();
        fixture.add_set_up(move |_| Err(Fault::error(message.clone())));
    }
    if let Some(message) = &spec.tear_down_fault {
        let message = message.clone();
        fixture.add_tear_down(move |_| Err(Fault::error(message.clone())));
    }

    for case in &spec.cases {
        fixture.add_child(build_case(case));
    }
    fixture.build()
}

fn build_case(spec: &CaseSpec) -> PatternTest {
    let mut case = PatternTestBuilder::case(&spec.name);
    match spec.outcome {
        CaseOutcome::Pass => {
            case.add_execute(|_| Ok(()));
        }
        CaseOutcome::Fail => {
            let message = spec
                .message
                .clone()
                .unwrap_or_else(|| "assertion failed".to_string());
            case.add_execute(move |_| Err(Fault::assertion(message.clone())));
        }
        CaseOutcome::Ignore => {
            case.set_ignore(spec.message.clone().unwrap_or_else(|| "ignored".to_string()));
        }
        CaseOutcome::Pending => {
            let message = spec
                .message
                .clone()
                .unwrap_or_else(|| "verdict undecided".to_string());
            case.add_execute(move |_| Err(Fault::new(FaultKind::Pending, message.clone())));
        }
    }
    case.build()
}
