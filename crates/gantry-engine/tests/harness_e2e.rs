//! End-to-end scenarios across the whole engine: session manager,
//! background runs, the harness lifecycle, and progress accounting.

use gantry_engine::{
    EngineResult, Fault, LogChannel, NullListener, Outcome, PatternTestBuilder, ProgressMonitor,
    RunConfig, SessionManager, TestArtifact, TestExecutionOptions, TestExplorationOptions,
    TestExplorer, TestFramework, TestHarness, TestPackage, TestRunStatus, TreeBuilder,
};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A framework contributing one fixture with one passing and one
/// throwing case per artifact. Optionally blocks the passing case on
/// a gate so tests can cancel at a deterministic point.
struct TwoCaseFramework {
    gate: Option<Arc<Mutex<mpsc::Receiver<()>>>>,
    executed: Arc<AtomicUsize>,
}

impl TwoCaseFramework {
    fn new() -> Self {
        Self {
            gate: None,
            executed: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn gated(gate: mpsc::Receiver<()>) -> Self {
        Self {
            gate: Some(Arc::new(Mutex::new(gate))),
            executed: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl TestFramework for TwoCaseFramework {
    fn name(&self) -> &str {
        "two-case"
    }

    fn create_explorer(&self) -> Box<dyn TestExplorer> {
        Box::new(TwoCaseExplorer {
            gate: self.gate.clone(),
            executed: self.executed.clone(),
        })
    }
}

struct TwoCaseExplorer {
    gate: Option<Arc<Mutex<mpsc::Receiver<()>>>>,
    executed: Arc<AtomicUsize>,
}

impl TestExplorer for TwoCaseExplorer {
    fn explore_artifact(
        &mut self,
        artifact: &TestArtifact,
        builder: &mut TreeBuilder<'_>,
    ) -> EngineResult<()> {
        let mut fixture = PatternTestBuilder::fixture(&artifact.name);

        let mut passing = PatternTestBuilder::case("passing");
        let gate = self.gate.clone();
        let executed = self.executed.clone();
        passing.add_execute(move |_| {
            if let Some(gate) = &gate {
                let _ = gate.lock().unwrap().recv();
            }
            executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        fixture.add_child(passing.build());

        let mut throwing = PatternTestBuilder::case("throwing");
        let executed = self.executed.clone();
        throwing.add_execute(move |_| {
            executed.fetch_add(1, Ordering::SeqCst);
            Err(Fault::error("deliberate fault during execute"))
        });
        fixture.add_child(throwing.build());

        builder.attach(fixture.build());
        Ok(())
    }
}

fn package_in(dir: &TempDir) -> TestPackage {
    let artifact = dir.path().join("suite_a");
    if !artifact.exists() {
        fs::create_dir(&artifact).unwrap();
    }
    TestPackage::new("demo", vec![artifact])
}

#[test]
fn full_cycle_reports_failure_and_per_node_progress() {
    let dir = TempDir::new().unwrap();
    let framework = Arc::new(TwoCaseFramework::new());
    let executed = framework.executed.clone();

    let manager = SessionManager::new();
    let session = manager.open_session();
    let run = session
        .create_run(RunConfig::new(package_in(&dir)).with_framework(framework))
        .unwrap();

    run.start().unwrap();
    assert!(run.wait_for_completion(Some(Duration::from_secs(10))));

    // The run finished even though a test failed: test failures are
    // outcomes, not engine faults.
    assert_eq!(run.status(), TestRunStatus::Finished);
    assert_eq!(executed.load(Ordering::SeqCst), 2);

    let report = run.report();
    assert_eq!(report.outcome, Some(Outcome::Failed));
    assert_eq!(report.statistics.passed, 1);
    assert_eq!(report.statistics.failed, 2); // throwing case + fixture aggregate

    // Exactly one failure-channel entry, attributed to the throwing
    // case.
    let failure_entries: Vec<_> = report
        .results
        .iter()
        .flat_map(|r| r.entries.iter().map(move |e| (r.name.as_str(), e)))
        .filter(|(_, e)| e.channel == LogChannel::Failure)
        .collect();
    assert_eq!(failure_entries.len(), 1);
    assert_eq!(failure_entries[0].0, "throwing");
    assert!(failure_entries[0].1.message.contains("deliberate fault"));

    let fixture_result = report.results.iter().find(|r| r.name == "suite_a").unwrap();
    assert_eq!(fixture_result.outcome, Outcome::Failed);
}

#[test]
fn execution_reports_one_work_unit_per_node() {
    let dir = TempDir::new().unwrap();
    let mut harness = TestHarness::new(vec![Arc::new(TwoCaseFramework::new())], Vec::new());
    harness
        .load(package_in(&dir), ProgressMonitor::new())
        .unwrap();
    harness
        .explore(&TestExplorationOptions::default(), ProgressMonitor::new())
        .unwrap();

    // Watch the run under a parent monitor: the harness consumes its
    // own, so completion is observed through proportional forwarding.
    let outer = ProgressMonitor::new();
    outer.begin_task("outer", 100.0).unwrap();
    let run_monitor = outer.create_sub_monitor(100.0).unwrap();

    let mut listener = NullListener;
    let report = harness
        .run(&TestExecutionOptions::default(), &mut listener, run_monitor)
        .unwrap();

    // One fixture + two cases executed, one worked(1) per node, and
    // the whole run budget drained.
    assert_eq!(report.statistics.run_count, 3);
    assert_eq!(outer.completed_work(), 100.0);
}

#[test]
fn canceling_mid_run_yields_canceled_with_partial_report() {
    let dir = TempDir::new().unwrap();
    let (gate_tx, gate_rx) = mpsc::channel();
    let framework = Arc::new(TwoCaseFramework::gated(gate_rx));

    let manager = SessionManager::new();
    let session = manager.open_session();
    let run = session
        .create_run(RunConfig::new(package_in(&dir)).with_framework(framework))
        .unwrap();

    run.start().unwrap();

    // Cancel while the gated case is executing (Explore has finished
    // by then), then release the gate so the worker can observe the
    // cancellation at its next checkpoint.
    run.stop();
    gate_tx.send(()).unwrap();

    assert!(run.wait_for_completion(Some(Duration::from_secs(10))));
    assert_eq!(run.status(), TestRunStatus::Canceled);

    // The snapshot reflects results up to the cancellation point; the
    // sibling scheduled after the gated case never ran.
    let report = run.report();
    assert!(!report.results.iter().any(|r| r.name == "throwing"));
}

#[test]
fn explore_only_cycle_surfaces_the_model() {
    let dir = TempDir::new().unwrap();
    let mut harness = TestHarness::new(vec![Arc::new(TwoCaseFramework::new())], Vec::new());
    harness
        .load(package_in(&dir), ProgressMonitor::new())
        .unwrap();
    harness
        .explore(&TestExplorationOptions::default(), ProgressMonitor::new())
        .unwrap();

    let model = harness.model().unwrap();
    assert_eq!(model.test_count(), 3);
    let root = model.root();
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].name, "suite_a");
    assert_eq!(root.children[0].children.len(), 2);

    harness.unload().unwrap();
    assert!(harness.model().is_none());
}

#[test]
fn filtered_run_only_executes_matching_subtree() {
    let dir = TempDir::new().unwrap();
    let framework = Arc::new(TwoCaseFramework::new());
    let executed = framework.executed.clone();

    let config = RunConfig::new(package_in(&dir))
        .with_framework(framework)
        .with_execution(TestExecutionOptions {
            filter: Some("passing".into()),
            ..TestExecutionOptions::default()
        });

    let run = gantry_engine::TestRun::new(config);
    run.start().unwrap();
    assert!(run.wait_for_completion(Some(Duration::from_secs(10))));

    assert_eq!(run.status(), TestRunStatus::Finished);
    assert_eq!(executed.load(Ordering::SeqCst), 1);
    let report = run.report();
    assert_eq!(report.outcome, Some(Outcome::Passed));
    assert_eq!(report.statistics.run_count, 2); // fixture + matching case
}
