//! Default execution strategy for pattern test trees
//!
//! Walks the tree depth-first, runs each node's lifecycle phases in
//! strict order, aggregates outcomes from children under the
//! dominance rule, and converts phase faults into outcomes. A fault
//! never escapes the node it occurred in.

use crate::framework::{StepInfo, TestListener};
use crate::model::outcome::{Fault, LogChannel, Outcome};
use crate::model::report::TestResult;
use crate::model::tree::TestId;
use crate::pattern::state::PatternTestState;
use crate::pattern::test::{Fixture, PatternTest};
use crate::progress::monitor::ProgressMonitor;
use std::collections::HashSet;
use std::time::Instant;

/// Runs pattern tests against a progress monitor and listener.
///
/// Progress is reported once per node (`worked(1)`) regardless of how
/// many phases ran; the caller begins the task with a total equal to
/// the number of nodes scheduled.
pub struct PatternTestController<'a> {
    monitor: &'a ProgressMonitor,
    listener: &'a mut dyn TestListener,
    included: Option<&'a HashSet<TestId>>,
    skip_execution: bool,
    results: Vec<TestResult>,
}

impl<'a> PatternTestController<'a> {
    pub fn new(monitor: &'a ProgressMonitor, listener: &'a mut dyn TestListener) -> Self {
        Self {
            monitor,
            listener,
            included: None,
            skip_execution: false,
            results: Vec::new(),
        }
    }

    /// Restrict execution to the given node ids
    pub fn with_included(mut self, included: &'a HashSet<TestId>) -> Self {
        self.included = Some(included);
        self
    }

    /// Walk the tree without running lifecycle phases
    pub fn with_skip_execution(mut self, skip: bool) -> Self {
        self.skip_execution = skip;
        self
    }

    /// Execute one subtree and return its aggregate outcome
    pub fn run(&mut self, test: &PatternTest) -> Outcome {
        self.run_node(test, None, None)
    }

    /// Results recorded so far, in completion order
    pub fn into_results(self) -> Vec<TestResult> {
        self.results
    }

    fn run_node(
        &mut self,
        test: &PatternTest,
        parent: Option<&PatternTest>,
        inherited: Option<&Fixture>,
    ) -> Outcome {
        // Cooperative cancellation: unvisited nodes are neither run
        // nor recorded.
        if self.monitor.is_canceled() {
            return Outcome::Inconclusive;
        }
        if let Some(included) = self.included {
            if !included.contains(&test.id) {
                return Outcome::Passed;
            }
        }

        let started = Instant::now();
        let step = StepInfo {
            id: test.id,
            name: test.name.clone(),
        };
        self.listener.step_started(&step);
        let _ = self.monitor.set_status(&test.name);

        let mut state = PatternTestState::new(&test.name);
        let outcome = if let Some(reason) = &test.ignore_reason {
            state.log(LogChannel::Warning, format!("ignored: {}", reason));
            Outcome::Inconclusive
        } else if self.skip_execution {
            self.run_children(test, &mut state)
        } else {
            self.run_lifecycle(test, parent, inherited, &mut state)
        };

        let result = TestResult {
            test_id: test.id,
            name: test.name.clone(),
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
            entries: state.take_entries(),
        };
        self.listener.step_finished(&step, &result);
        self.results.push(result);
        let _ = self.monitor.worked(1.0);

        outcome
    }

    fn run_lifecycle(
        &mut self,
        test: &PatternTest,
        parent: Option<&PatternTest>,
        inherited: Option<&Fixture>,
        state: &mut PatternTestState,
    ) -> Outcome {
        let init = Self::initialize(test, inherited, state);
        let mut outcome = self.absorb(state, init, "initialize");
        if !outcome.is_passed() {
            return outcome;
        }

        // Set up: the parent's before-child hook runs first; a fault
        // there skips the node's own chain.
        let set_up = match parent {
            Some(parent) => parent
                .before_child
                .run(state)
                .and_then(|_| test.set_up.run(state)),
            None => test.set_up.run(state),
        };
        let set_up_outcome = self.absorb(state, set_up, "set up");
        outcome = outcome.combine(set_up_outcome);

        if set_up_outcome.is_passed() {
            let execute = test.execute.run(state);
            let execute_outcome = self.absorb(state, execute, "execute");
            outcome = outcome.combine(execute_outcome);

            if execute_outcome.is_passed() {
                outcome = outcome.combine(self.run_children(test, state));
            }
        }

        // Tear down always runs once set-up was attempted, and the
        // parent's after-child hook runs even if tear-down faulted.
        let tear_down = test.tear_down.run(state);
        outcome = outcome.combine(self.absorb(state, tear_down, "tear down"));
        if let Some(parent) = parent {
            let after = parent.after_child.run(state);
            outcome = outcome.combine(self.absorb(state, after, "after child"));
        }

        outcome
    }

    fn run_children(&mut self, test: &PatternTest, state: &mut PatternTestState) -> Outcome {
        let mut combined = Outcome::Passed;
        for child in &test.children {
            if self.monitor.is_canceled() {
                break;
            }
            // A failing child fails the aggregate but does not stop
            // its siblings.
            let child_outcome = self.run_node(child, Some(test), state.fixture());
            combined = combined.combine(child_outcome);
        }
        combined
    }

    fn initialize(
        test: &PatternTest,
        inherited: Option<&Fixture>,
        state: &mut PatternTestState,
    ) -> Result<(), Fault> {
        match &test.fixture_factory {
            Some(factory) => state.set_fixture(Some(factory()?)),
            None => state.set_fixture(inherited.cloned()),
        }
        Ok(())
    }

    /// Map a phase result to an outcome, logging any fault on the
    /// channel that outcome selects
    fn absorb(
        &self,
        state: &mut PatternTestState,
        result: Result<(), Fault>,
        phase: &str,
    ) -> Outcome {
        match result {
            Ok(()) => Outcome::Passed,
            Err(fault) => {
                let outcome = fault.outcome();
                state.log(
                    outcome.log_channel(),
                    format!("{}: {}", phase, fault.message),
                );
                outcome
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::NullListener;
    use crate::model::outcome::FaultKind;
    use crate::pattern::builder::PatternTestBuilder;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<String>>>;

    fn tracing_action(
        trace: &Trace,
        label: &str,
        result: Result<(), Fault>,
    ) -> impl Fn(&mut PatternTestState) -> Result<(), Fault> + Send + Sync + 'static {
        let trace = trace.clone();
        let label = label.to_string();
        move |_| {
            trace.lock().unwrap().push(label.clone());
            result.clone()
        }
    }

    fn run_tree(test: &mut PatternTest) -> (Vec<TestResult>, Outcome, f64) {
        assign_ids(test, &mut 1);
        let monitor = ProgressMonitor::new();
        monitor
            .begin_task("Running tests", test.size() as f64)
            .unwrap();
        let mut listener = NullListener;
        let mut controller = PatternTestController::new(&monitor, &mut listener);
        let outcome = controller.run(test);
        let worked = monitor.completed_work();
        (controller.into_results(), outcome, worked)
    }

    fn assign_ids(test: &mut PatternTest, next: &mut TestId) {
        test.id = *next;
        *next += 1;
        for child in &mut test.children {
            assign_ids(child, next);
        }
    }

    #[test]
    fn lifecycle_phase_order() {
        let trace: Trace = Arc::default();

        let mut case = PatternTestBuilder::case("case");
        case.add_set_up(tracing_action(&trace, "case set up", Ok(())));
        case.add_execute(tracing_action(&trace, "case execute", Ok(())));
        case.add_tear_down(tracing_action(&trace, "case tear down", Ok(())));

        let mut fixture = PatternTestBuilder::fixture("fixture");
        fixture.add_set_up(tracing_action(&trace, "fixture set up", Ok(())));
        fixture.add_before_child(tracing_action(&trace, "before child", Ok(())));
        fixture.add_after_child(tracing_action(&trace, "after child", Ok(())));
        fixture.add_tear_down(tracing_action(&trace, "fixture tear down", Ok(())));
        fixture.add_child(case.build());

        let (_, outcome, _) = run_tree(&mut fixture.build());
        assert_eq!(outcome, Outcome::Passed);
        assert_eq!(
            *trace.lock().unwrap(),
            vec![
                "fixture set up",
                "before child",
                "case set up",
                "case execute",
                "case tear down",
                "after child",
                "fixture tear down",
            ]
        );
    }

    #[test]
    fn tear_down_runs_when_set_up_faults() {
        let trace: Trace = Arc::default();

        let mut case = PatternTestBuilder::case("case");
        case.add_set_up(tracing_action(
            &trace,
            "set up",
            Err(Fault::error("set up broke")),
        ));
        case.add_execute(tracing_action(&trace, "execute", Ok(())));
        case.add_tear_down(tracing_action(&trace, "tear down", Ok(())));

        let (results, outcome, _) = run_tree(&mut case.build());
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(*trace.lock().unwrap(), vec!["set up", "tear down"]);

        // The fault produced exactly one failure-channel entry.
        let failure_entries: Vec<_> = results[0]
            .entries
            .iter()
            .filter(|e| e.channel == LogChannel::Failure)
            .collect();
        assert_eq!(failure_entries.len(), 1);
        assert!(failure_entries[0].message.contains("set up broke"));
    }

    #[test]
    fn failing_child_fails_aggregate_but_siblings_run() {
        let trace: Trace = Arc::default();

        let mut failing = PatternTestBuilder::case("failing");
        failing.add_execute(tracing_action(
            &trace,
            "failing",
            Err(Fault::assertion("1 != 2")),
        ));
        let mut passing = PatternTestBuilder::case("passing");
        passing.add_execute(tracing_action(&trace, "passing", Ok(())));

        let mut fixture = PatternTestBuilder::fixture("fixture");
        fixture.add_child(failing.build());
        fixture.add_child(passing.build());

        let (results, outcome, _) = run_tree(&mut fixture.build());
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(*trace.lock().unwrap(), vec!["failing", "passing"]);

        let by_name = |name: &str| results.iter().find(|r| r.name == name).unwrap();
        assert_eq!(by_name("failing").outcome, Outcome::Failed);
        assert_eq!(by_name("passing").outcome, Outcome::Passed);
        assert_eq!(by_name("fixture").outcome, Outcome::Failed);
    }

    #[test]
    fn inconclusive_child_without_failures_is_inconclusive() {
        let mut child = PatternTestBuilder::case("pending");
        child.add_execute(|_| Err(Fault::new(FaultKind::Pending, "undecided")));

        let mut fixture = PatternTestBuilder::fixture("fixture");
        fixture.add_child(child.build());

        let (_, outcome, _) = run_tree(&mut fixture.build());
        assert_eq!(outcome, Outcome::Inconclusive);
    }

    #[test]
    fn ignore_marker_skips_all_phases() {
        let trace: Trace = Arc::default();

        let mut case = PatternTestBuilder::case("case");
        case.set_ignore("not ready");
        case.add_set_up(tracing_action(&trace, "set up", Ok(())));
        case.add_execute(tracing_action(&trace, "execute", Ok(())));
        case.add_tear_down(tracing_action(&trace, "tear down", Ok(())));

        let (results, outcome, _) = run_tree(&mut case.build());
        assert_eq!(outcome, Outcome::Inconclusive);
        assert!(trace.lock().unwrap().is_empty());
        assert!(results[0]
            .entries
            .iter()
            .any(|e| e.channel == LogChannel::Warning && e.message.contains("not ready")));
    }

    #[test]
    fn children_skipped_when_execute_fails() {
        let trace: Trace = Arc::default();

        let mut child = PatternTestBuilder::case("child");
        child.add_execute(tracing_action(&trace, "child", Ok(())));

        let mut parent = PatternTestBuilder::fixture("parent");
        parent.add_execute(tracing_action(
            &trace,
            "parent execute",
            Err(Fault::error("broken")),
        ));
        parent.add_child(child.build());

        let (_, outcome, _) = run_tree(&mut parent.build());
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(*trace.lock().unwrap(), vec!["parent execute"]);
    }

    #[test]
    fn fixture_instance_hands_off_to_children() {
        let seen: Arc<Mutex<Vec<u32>>> = Arc::default();

        let mut child = PatternTestBuilder::case("child");
        let seen_by_child = seen.clone();
        child.add_execute(move |state| {
            let value = state
                .fixture_as::<u32>()
                .ok_or_else(|| Fault::error("no fixture"))?;
            seen_by_child.lock().unwrap().push(*value);
            Ok(())
        });

        let mut own = PatternTestBuilder::case("own_fixture");
        own.set_fixture_factory(|| Ok(Arc::new(99u32) as Fixture));
        let seen_by_own = seen.clone();
        own.add_execute(move |state| {
            let value = state
                .fixture_as::<u32>()
                .ok_or_else(|| Fault::error("no fixture"))?;
            seen_by_own.lock().unwrap().push(*value);
            Ok(())
        });

        let mut fixture = PatternTestBuilder::fixture("fixture");
        fixture.set_fixture_factory(|| Ok(Arc::new(7u32) as Fixture));
        fixture.add_child(child.build());
        fixture.add_child(own.build());

        let (_, outcome, _) = run_tree(&mut fixture.build());
        assert_eq!(outcome, Outcome::Passed);
        assert_eq!(*seen.lock().unwrap(), vec![7, 99]);
    }

    #[test]
    fn fixture_factory_fault_fails_initialize_and_skips_phases() {
        let trace: Trace = Arc::default();

        let mut case = PatternTestBuilder::case("case");
        case.set_fixture_factory(|| Err(Fault::error("cannot construct")));
        case.add_set_up(tracing_action(&trace, "set up", Ok(())));
        case.add_tear_down(tracing_action(&trace, "tear down", Ok(())));

        let (results, outcome, _) = run_tree(&mut case.build());
        assert_eq!(outcome, Outcome::Failed);
        assert!(trace.lock().unwrap().is_empty());
        assert!(results[0].entries[0].message.contains("initialize"));
    }

    #[test]
    fn one_work_unit_per_node() {
        let mut fixture = PatternTestBuilder::fixture("fixture");
        for name in ["a", "b", "c"] {
            fixture.add_child(PatternTestBuilder::case(name).build());
        }

        let (results, _, worked) = run_tree(&mut fixture.build());
        assert_eq!(results.len(), 4);
        assert_eq!(worked, 4.0);
    }

    #[test]
    fn cancellation_stops_unvisited_siblings() {
        let monitor = ProgressMonitor::new();
        monitor.begin_task("Running tests", 3.0).unwrap();

        let cancel = monitor.cancel_handle();
        let mut first = PatternTestBuilder::case("first");
        first.add_execute(move |_| {
            cancel.cancel();
            Ok(())
        });

        let mut fixture = PatternTestBuilder::fixture("fixture");
        fixture.add_child(first.build());
        fixture.add_child(PatternTestBuilder::case("second").build());
        let mut tree = fixture.build();
        assign_ids(&mut tree, &mut 1);

        let mut listener = NullListener;
        let mut controller = PatternTestController::new(&monitor, &mut listener);
        controller.run(&tree);
        let results = controller.into_results();

        // The first case and the fixture are recorded; the second
        // sibling never ran.
        assert!(results.iter().any(|r| r.name == "first"));
        assert!(!results.iter().any(|r| r.name == "second"));
    }
}
