//! The test-plan abstraction between the harness and the execution
//! strategy

use crate::error::EngineResult;
use crate::framework::TestListener;
use crate::model::outcome::Outcome;
use crate::model::report::TestResult;
use crate::model::tree::{TestId, TestModel};
use crate::pattern::controller::PatternTestController;
use crate::pattern::test::PatternTest;
use crate::progress::monitor::ProgressMonitor;
use std::collections::HashSet;

/// Options controlling one execution pass
#[derive(Debug, Clone, Default)]
pub struct TestExecutionOptions {
    /// Case-sensitive substring filter on test names. A match selects
    /// the whole subtree under the matching node.
    pub filter: Option<String>,
    /// Walk the tree without running lifecycle phases
    pub skip_execution: bool,
}

/// What an execution pass produced
#[derive(Debug)]
pub struct PlanOutput {
    pub results: Vec<TestResult>,
    /// Aggregate outcome across all executed roots, or `None` when
    /// nothing was scheduled
    pub outcome: Option<Outcome>,
}

/// Scheduling strategy the harness delegates tree walking to
pub trait TestPlan: Send {
    fn run(
        &mut self,
        model: &TestModel,
        options: &TestExecutionOptions,
        listener: &mut dyn TestListener,
        monitor: &ProgressMonitor,
    ) -> EngineResult<PlanOutput>;
}

/// Default plan: one sequential pass over every scheduled suite using
/// the pattern controller
#[derive(Debug, Default)]
pub struct DefaultTestPlan;

impl TestPlan for DefaultTestPlan {
    fn run(
        &mut self,
        model: &TestModel,
        options: &TestExecutionOptions,
        listener: &mut dyn TestListener,
        monitor: &ProgressMonitor,
    ) -> EngineResult<PlanOutput> {
        let included = options.filter.as_deref().map(|filter| {
            let mut set = HashSet::new();
            for suite in model.suites() {
                collect_included(suite, filter, false, &mut set);
            }
            set
        });

        let total = match &included {
            Some(set) => set.len(),
            None => model.suites().iter().map(PatternTest::size).sum(),
        };
        let total_units = if total == 0 { f64::NAN } else { total as f64 };
        monitor.begin_task("Running tests", total_units)?;

        let mut controller = PatternTestController::new(monitor, listener);
        if let Some(set) = &included {
            controller = controller.with_included(set);
        }
        controller = controller.with_skip_execution(options.skip_execution);

        let mut outcome: Option<Outcome> = None;
        for suite in model.suites() {
            if monitor.is_canceled() {
                break;
            }
            if included.as_ref().is_some_and(|set| !set.contains(&suite.id())) {
                continue;
            }
            let suite_outcome = controller.run(suite);
            outcome = Some(match outcome {
                Some(previous) => previous.combine(suite_outcome),
                None => suite_outcome,
            });
        }

        let results = controller.into_results();
        monitor.done();
        Ok(PlanOutput { results, outcome })
    }
}

/// Mark `test` and the relevant parts of its subtree as included.
/// A node is included when it matches, descends from a match, or has
/// a match somewhere below it. Returns whether the subtree holds a
/// match.
fn collect_included(
    test: &PatternTest,
    filter: &str,
    ancestor_matched: bool,
    set: &mut HashSet<TestId>,
) -> bool {
    let matched = ancestor_matched || test.name().contains(filter);
    let mut any = matched;
    for child in test.children() {
        if collect_included(child, filter, matched, set) {
            any = true;
        }
    }
    if any {
        set.insert(test.id());
    }
    any
}
