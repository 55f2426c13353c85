//! Asynchronous test runs
//!
//! A [`TestRun`] wraps one harness execution as a cancellable
//! background task. The worker thread drives Load → Explore → Run →
//! Unload, publishing an immutable report snapshot at every phase
//! boundary; readers take snapshots at any time without observing a
//! tear. No failure crosses the run's asynchronous boundary: faults
//! surface through the terminal status and the log event.

use crate::error::{EngineError, EngineResult};
use crate::framework::{NullListener, ReportManager, RunPhase, TestEnvironment, TestFramework, TestListener};
use crate::harness::{TestExplorationOptions, TestHarness};
use crate::model::package::TestPackage;
use crate::model::report::{Report, ReportBox};
use crate::plan::TestExecutionOptions;
use crate::progress::monitor::{CancelHandle, ProgressMonitor, ProgressObserver};
use crate::runner::events::{EventHandlers, LogMessageEvent, LogSeverity};
use crate::runner::report_cache::ReportCache;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Status of a test run. Exactly one transition path:
/// Pending → Running → {Error | Canceled | Finished}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestRunStatus {
    Pending,
    Running,
    Error,
    Canceled,
    Finished,
}

impl TestRunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Canceled | Self::Finished)
    }
}

/// Everything a run needs to execute a harness lifecycle
pub struct RunConfig {
    pub package: TestPackage,
    pub frameworks: Vec<Arc<dyn TestFramework>>,
    pub environments: Vec<Arc<dyn TestEnvironment>>,
    pub exploration: TestExplorationOptions,
    pub execution: TestExecutionOptions,
    /// Receives structured events on the worker thread
    pub listener: Option<Box<dyn TestListener>>,
    /// Attached to the run's root progress monitor before it begins
    pub observers: Vec<Box<dyn ProgressObserver>>,
}

impl RunConfig {
    pub fn new(package: TestPackage) -> Self {
        Self {
            package,
            frameworks: Vec::new(),
            environments: Vec::new(),
            exploration: TestExplorationOptions::default(),
            execution: TestExecutionOptions::default(),
            listener: None,
            observers: Vec::new(),
        }
    }

    pub fn with_framework(mut self, framework: Arc<dyn TestFramework>) -> Self {
        self.frameworks.push(framework);
        self
    }

    pub fn with_environment(mut self, environment: Arc<dyn TestEnvironment>) -> Self {
        self.environments.push(environment);
        self
    }

    pub fn with_execution(mut self, execution: TestExecutionOptions) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_listener(mut self, listener: Box<dyn TestListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

/// Hooks into a run before it starts; frozen once the run leaves
/// `Pending`
pub trait TestRunExtension: Send + Sync {
    fn attach(&self, run: &TestRun);
}

struct RunState {
    id: Uuid,
    status: Mutex<TestRunStatus>,
    status_changed: Condvar,
    report: ReportBox,
    extensions: Mutex<Vec<Arc<dyn TestRunExtension>>>,
    config: Mutex<Option<RunConfig>>,
    cancel: Mutex<Option<CancelHandle>>,
    stop_requested: AtomicBool,
    started_event: EventHandlers<()>,
    stopped_event: EventHandlers<()>,
    log_event: EventHandlers<LogMessageEvent>,
}

impl RunState {
    fn log(&self, severity: LogSeverity, message: impl Into<String>) {
        self.log_event.emit(&LogMessageEvent::new(severity, message));
    }

    /// Commit a terminal status if the run is still `Running`; there
    /// is no transition out of a terminal state.
    fn finish(&self, terminal: TestRunStatus) {
        {
            let mut status = self.status.lock().expect("run status poisoned");
            if *status == TestRunStatus::Running {
                *status = terminal;
            }
        }
        self.status_changed.notify_all();
    }
}

/// Handle to one asynchronous test run. Cloneable; all clones share
/// the same underlying run.
#[derive(Clone)]
pub struct TestRun {
    state: Arc<RunState>,
}

impl TestRun {
    pub fn new(config: RunConfig) -> Self {
        Self {
            state: Arc::new(RunState {
                id: Uuid::new_v4(),
                status: Mutex::new(TestRunStatus::Pending),
                status_changed: Condvar::new(),
                report: ReportBox::default(),
                extensions: Mutex::new(Vec::new()),
                config: Mutex::new(Some(config)),
                cancel: Mutex::new(None),
                stop_requested: AtomicBool::new(false),
                started_event: EventHandlers::new(),
                stopped_event: EventHandlers::new(),
                log_event: EventHandlers::new(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.state.id
    }

    pub fn status(&self) -> TestRunStatus {
        *self.state.status.lock().expect("run status poisoned")
    }

    /// Latest published report snapshot
    pub fn report(&self) -> Arc<Report> {
        self.state.report.read()
    }

    pub fn on_started(&self, handler: impl Fn(&()) + Send + Sync + 'static) {
        self.state.started_event.subscribe(handler);
    }

    pub fn on_stopped(&self, handler: impl Fn(&()) + Send + Sync + 'static) {
        self.state.stopped_event.subscribe(handler);
    }

    pub fn on_log_message(&self, handler: impl Fn(&LogMessageEvent) + Send + Sync + 'static) {
        self.state.log_event.subscribe(handler);
    }

    /// Register an extension. Rejected once the run has started.
    pub fn add_extension(&self, extension: Arc<dyn TestRunExtension>) -> EngineResult<()> {
        let status = self.state.status.lock().expect("run status poisoned");
        if *status != TestRunStatus::Pending {
            return Err(EngineError::invalid_state(
                "extensions cannot be added once the run has started",
            ));
        }
        self.state
            .extensions
            .lock()
            .expect("extension list poisoned")
            .push(extension);
        Ok(())
    }

    /// Spawn the background worker. Refuses a second start and refuses
    /// to start a run that was already stopped.
    pub fn start(&self) -> EngineResult<()> {
        let config = {
            let mut status = self.state.status.lock().expect("run status poisoned");
            if *status != TestRunStatus::Pending {
                return Err(EngineError::invalid_state(
                    "the test run has already been started",
                ));
            }
            *status = TestRunStatus::Running;
            self.state
                .config
                .lock()
                .expect("run config poisoned")
                .take()
                .ok_or_else(|| EngineError::invalid_state("the test run has no configuration"))?
        };

        let state = self.state.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("test-run-{}", self.state.id))
            .spawn(move || {
                let run = TestRun {
                    state: state.clone(),
                };
                let extensions = state
                    .extensions
                    .lock()
                    .expect("extension list poisoned")
                    .clone();
                for extension in extensions {
                    extension.attach(&run);
                }

                state.started_event.emit(&());

                let outcome = catch_unwind(AssertUnwindSafe(|| execute(&state, config)));
                let terminal = match outcome {
                    Ok(TestRunStatus::Running) => {
                        // The body must set its terminal status; not
                        // doing so is an engine bug.
                        state.log(
                            LogSeverity::Error,
                            "the test run task failed to update its status",
                        );
                        TestRunStatus::Error
                    }
                    Ok(status) => status,
                    Err(panic) => {
                        state.log(
                            LogSeverity::Error,
                            format!(
                                "the test run task failed with a fatal fault: {}",
                                panic_message(&panic)
                            ),
                        );
                        TestRunStatus::Error
                    }
                };

                *state.cancel.lock().expect("cancel handle poisoned") = None;
                state.finish(terminal);
                state.stopped_event.emit(&());
            });

        if let Err(e) = spawned {
            self.state.log(
                LogSeverity::Error,
                format!("failed to spawn the test run worker: {}", e),
            );
            self.state.finish(TestRunStatus::Error);
            return Err(e.into());
        }
        Ok(())
    }

    /// Request cancellation of the active run. Cooperative: the worker
    /// observes it at the next checkpoint. Stopping a run that never
    /// started moves it straight to `Canceled`.
    pub fn stop(&self) {
        self.state.stop_requested.store(true, Ordering::SeqCst);

        let became_canceled = {
            let mut status = self.state.status.lock().expect("run status poisoned");
            if *status == TestRunStatus::Pending {
                *status = TestRunStatus::Canceled;
                true
            } else {
                false
            }
        };
        if became_canceled {
            self.state.status_changed.notify_all();
            self.state.stopped_event.emit(&());
            return;
        }

        let cancel = self
            .state
            .cancel
            .lock()
            .expect("cancel handle poisoned")
            .clone();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
    }

    /// Block until the run reaches a terminal status, up to `timeout`
    /// (indefinitely when `None`). Returns whether completion
    /// occurred.
    pub fn wait_for_completion(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut status = self.state.status.lock().expect("run status poisoned");
        loop {
            if status.is_terminal() {
                return true;
            }
            match deadline {
                None => {
                    status = self
                        .state
                        .status_changed
                        .wait(status)
                        .expect("run status poisoned");
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return status.is_terminal();
                    }
                    let (guard, _) = self
                        .state
                        .status_changed
                        .wait_timeout(status, deadline - now)
                        .expect("run status poisoned");
                    status = guard;
                }
            }
        }
    }

    /// Materialize a formatted report artifact in the per-run disk
    /// cache
    pub fn formatted_report(
        &self,
        format: &str,
        manager: &dyn ReportManager,
        cache: &ReportCache,
    ) -> EngineResult<std::path::PathBuf> {
        cache.materialize(self.state.id, &self.report(), format, manager)
    }
}

/// The worker body: the full harness lifecycle with a snapshot
/// published at every phase boundary. Returns the terminal status.
fn execute(state: &Arc<RunState>, config: RunConfig) -> TestRunStatus {
    let started_at = Utc::now();
    let monitor = ProgressMonitor::new();
    for observer in config.observers {
        monitor.add_observer(observer);
    }
    *state.cancel.lock().expect("cancel handle poisoned") = Some(monitor.cancel_handle());
    if state.stop_requested.load(Ordering::SeqCst) {
        monitor.cancel();
    }

    let mut listener: Box<dyn TestListener> = match config.listener {
        Some(listener) => listener,
        None => Box::new(NullListener),
    };
    let mut harness = TestHarness::new(config.frameworks, config.environments);

    let result = drive_phases(
        state,
        &mut harness,
        &monitor,
        listener.as_mut(),
        config.package,
        &config.exploration,
        &config.execution,
        started_at,
    );
    monitor.done();

    match result {
        Ok(()) => TestRunStatus::Finished,
        Err(e) if e.is_canceled() || monitor.is_canceled() => TestRunStatus::Canceled,
        Err(e) => {
            state.log(
                LogSeverity::Error,
                format!("the test run failed with a fatal fault: {}", e),
            );
            TestRunStatus::Error
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn drive_phases(
    state: &Arc<RunState>,
    harness: &mut TestHarness,
    monitor: &ProgressMonitor,
    listener: &mut dyn TestListener,
    package: TestPackage,
    exploration: &TestExplorationOptions,
    execution: &TestExecutionOptions,
    started_at: DateTime<Utc>,
) -> EngineResult<()> {
    monitor.begin_task("Running tests", 10.0)?;

    listener.phase_started(RunPhase::Load);
    harness.load(package, monitor.create_sub_monitor(2.0)?)?;
    state.report.publish(Report {
        package: harness.package_summary(),
        annotations: harness.annotations(),
        started_at: Some(started_at),
        ..Report::default()
    });
    listener.phase_finished(RunPhase::Load);
    monitor.check_canceled()?;

    listener.phase_started(RunPhase::Explore);
    harness.explore(exploration, monitor.create_sub_monitor(2.0)?)?;
    state.report.publish(Report {
        package: harness.package_summary(),
        model: harness.model().map(|m| crate::model::report::ModelSummary {
            test_count: m.test_count(),
        }),
        annotations: harness.annotations(),
        started_at: Some(started_at),
        ..Report::default()
    });
    listener.phase_finished(RunPhase::Explore);
    monitor.check_canceled()?;

    listener.phase_started(RunPhase::Run);
    let mut report = harness.run(execution, listener, monitor.create_sub_monitor(5.0)?)?;
    report.started_at = Some(started_at);
    state.report.publish(report);
    listener.phase_finished(RunPhase::Run);
    monitor.check_canceled()?;

    listener.phase_started(RunPhase::Unload);
    harness.unload()?;
    monitor.worked(1.0)?;
    listener.phase_finished(RunPhase::Unload);

    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
