//! The test harness lifecycle
//!
//! A harness owns one package's journey: load the artifacts, build the
//! test model by asking every registered framework to contribute, and
//! run the model through a test plan. Operations are guarded by a
//! state machine and report through progress monitors with fixed
//! phase budgets, so a caller can predict overall completion from
//! sub-task weights.

use crate::error::{EngineError, EngineResult};
use crate::framework::{EnvironmentScopes, TestEnvironment, TestFramework, TestListener};
use crate::model::package::{TestArtifact, TestPackage};
use crate::model::report::{ModelSummary, PackageSummary, Report, Statistics};
use crate::model::tree::{Annotation, TestModel, TreeBuilder};
use crate::plan::{DefaultTestPlan, TestExecutionOptions, TestPlan};
use crate::progress::monitor::ProgressMonitor;
use chrono::Utc;
use std::sync::Arc;

/// Options controlling the exploration pass
#[derive(Debug, Clone, Default)]
pub struct TestExplorationOptions {
    /// Treat an explorer failure as fatal instead of annotating the
    /// offending artifact and continuing
    pub fail_on_discovery_error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HarnessState {
    Created,
    Loaded,
    Explored,
    Unloaded,
    Disposed,
}

/// Drives the load → explore → run lifecycle for one test package.
///
/// Frameworks and environments are injected at construction; there is
/// no process-wide registry.
pub struct TestHarness {
    state: HarnessState,
    frameworks: Vec<Arc<dyn TestFramework>>,
    environments: Vec<Arc<dyn TestEnvironment>>,
    plan: Box<dyn TestPlan>,
    package: Option<TestPackage>,
    artifacts: Vec<TestArtifact>,
    load_annotations: Vec<Annotation>,
    model: Option<TestModel>,
}

impl TestHarness {
    pub fn new(
        frameworks: Vec<Arc<dyn TestFramework>>,
        environments: Vec<Arc<dyn TestEnvironment>>,
    ) -> Self {
        Self {
            state: HarnessState::Created,
            frameworks,
            environments,
            plan: Box::new(DefaultTestPlan),
            package: None,
            artifacts: Vec::new(),
            load_annotations: Vec::new(),
            model: None,
        }
    }

    /// Replace the execution strategy used by [`run`](Self::run)
    pub fn set_plan(&mut self, plan: Box<dyn TestPlan>) {
        self.plan = plan;
    }

    /// The loaded package, if any
    pub fn package(&self) -> Option<&TestPackage> {
        self.package.as_ref()
    }

    /// The artifacts that loaded successfully
    pub fn artifacts(&self) -> &[TestArtifact] {
        &self.artifacts
    }

    /// The explored model, if exploration has run
    pub fn model(&self) -> Option<&TestModel> {
        self.model.as_ref()
    }

    /// Load faults plus discovery faults recorded so far
    pub fn annotations(&self) -> Vec<Annotation> {
        let mut all = self.load_annotations.clone();
        if let Some(model) = &self.model {
            all.extend(model.annotations().iter().cloned());
        }
        all
    }

    /// Summary of the loaded package for reporting
    pub fn package_summary(&self) -> Option<PackageSummary> {
        self.package.as_ref().map(|p| PackageSummary {
            name: p.name.clone(),
            artifact_count: self.artifacts.len(),
            load_faults: self.load_annotations.len(),
        })
    }

    /// Load the package: resolve and register every artifact.
    ///
    /// An artifact that fails to resolve is recorded as a fault on
    /// that artifact; loading continues unless the package opts into
    /// fail-fast. Budget: 10 work units (1 pre-processing, 8 artifact
    /// loads, 1 post-processing).
    pub fn load(&mut self, package: TestPackage, monitor: ProgressMonitor) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        if !matches!(self.state, HarnessState::Created | HarnessState::Unloaded) {
            return Err(EngineError::invalid_state("a package has already been loaded"));
        }

        package.validate()?;

        monitor.begin_task("Loading test package", 10.0)?;
        monitor.set_status("Performing pre-processing")?;
        for framework in &self.frameworks {
            framework.prepare_package(&package)?;
        }
        monitor.worked(1.0)?;

        self.load_artifacts(&package, monitor.create_sub_monitor(8.0)?)?;

        monitor.set_status("Performing post-processing")?;
        self.package = Some(package);
        self.state = HarnessState::Loaded;
        monitor.worked(1.0)?;
        Ok(())
    }

    fn load_artifacts(
        &mut self,
        package: &TestPackage,
        monitor: ProgressMonitor,
    ) -> EngineResult<()> {
        let paths = &package.artifact_paths;
        if paths.is_empty() {
            return Ok(());
        }

        monitor.begin_task("Loading test artifacts", paths.len() as f64)?;
        for path in paths {
            monitor.check_canceled()?;
            monitor.set_status(&format!("Loading: {}", path.display()))?;

            match package.resolve_artifact(path) {
                Some(resolved) => self.artifacts.push(TestArtifact::new(resolved)),
                None => {
                    if package.fail_fast {
                        return Err(EngineError::artifact_load(path, "artifact not found"));
                    }
                    self.load_annotations.push(Annotation::new(
                        path.display().to_string(),
                        "artifact not found",
                    ));
                }
            }
            monitor.worked(1.0)?;
        }
        Ok(())
    }

    /// Build the test model by letting every framework's explorer
    /// contribute a subtree per loaded artifact, in registration
    /// order. Explorer failures annotate the offending artifact;
    /// exploration of siblings continues.
    pub fn explore(
        &mut self,
        options: &TestExplorationOptions,
        monitor: ProgressMonitor,
    ) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        if self.state != HarnessState::Loaded {
            return Err(EngineError::invalid_state("no test package has been loaded"));
        }
        let Some(package) = self.package.as_ref() else {
            return Err(EngineError::invalid_state("no test package has been loaded"));
        };

        monitor.begin_task("Building test model", 10.0)?;
        let mut model = TestModel::new(&package.name);
        monitor.worked(1.0)?;

        let explore_monitor = monitor.create_sub_monitor(8.0)?;
        let steps = self.frameworks.len() * self.artifacts.len();
        if steps > 0 {
            explore_monitor.begin_task("Exploring artifacts", steps as f64)?;
            for framework in &self.frameworks {
                let mut explorer = framework.create_explorer();
                for artifact in &self.artifacts {
                    explore_monitor.check_canceled()?;
                    explore_monitor.set_status(&format!(
                        "{}: {}",
                        framework.name(),
                        artifact.name
                    ))?;

                    let mut builder = TreeBuilder::new(&mut model, artifact);
                    if let Err(e) = explorer.explore_artifact(artifact, &mut builder) {
                        if options.fail_on_discovery_error {
                            return Err(e);
                        }
                        model.add_annotation(Annotation::new(artifact.name.clone(), e.to_string()));
                    }
                    explore_monitor.worked(1.0)?;
                }
            }
        }
        drop(explore_monitor);

        self.model = Some(model);
        self.state = HarnessState::Explored;
        monitor.worked(1.0)?;
        Ok(())
    }

    /// Execute the explored model under the test plan.
    ///
    /// Every registered environment is set up before execution and
    /// released in reverse acquisition order afterwards, even when
    /// execution fails. Budget: 100 work units (5 environment set-up,
    /// 5 planning, 85 execution, 5 tear-down).
    pub fn run(
        &mut self,
        options: &TestExecutionOptions,
        listener: &mut dyn TestListener,
        monitor: ProgressMonitor,
    ) -> EngineResult<Report> {
        self.ensure_not_disposed()?;
        let Some(model) = self.model.as_ref().filter(|_| self.state == HarnessState::Explored)
        else {
            return Err(EngineError::invalid_state("the test model has not been built"));
        };

        let started_at = Utc::now();
        monitor.begin_task("Running tests", 100.0)?;

        monitor.set_status("Setting up the test environment")?;
        let mut scopes = EnvironmentScopes::default();
        for environment in &self.environments {
            scopes.push(environment.set_up()?);
        }
        monitor.worked(5.0)?;

        monitor.set_status("Building the run plan")?;
        monitor.worked(5.0)?;
        monitor.set_status("")?;

        let execution = {
            let plan_monitor = monitor.create_sub_monitor(85.0)?;
            self.plan.run(model, options, listener, &plan_monitor)
        };

        // Scopes release in reverse acquisition order whether the plan
        // succeeded or not.
        monitor.set_status("Tearing down the test environment")?;
        drop(scopes);
        let output = execution?;
        monitor.worked(5.0)?;
        monitor.set_status("")?;

        let mut statistics = Statistics::default();
        for result in &output.results {
            statistics.record(result.outcome);
        }

        Ok(Report {
            package: self.package_summary(),
            model: Some(ModelSummary {
                test_count: model.test_count(),
            }),
            annotations: self.annotations(),
            results: output.results,
            statistics,
            started_at: Some(started_at),
            finished_at: Some(Utc::now()),
            outcome: output.outcome,
        })
    }

    /// Release the model and package. Idempotent.
    pub fn unload(&mut self) -> EngineResult<()> {
        self.ensure_not_disposed()?;
        self.package = None;
        self.model = None;
        self.artifacts.clear();
        self.load_annotations.clear();
        self.state = HarnessState::Unloaded;
        Ok(())
    }

    /// Release everything and retire the harness. Idempotent; every
    /// other operation fails afterwards.
    pub fn dispose(&mut self) {
        if self.state == HarnessState::Disposed {
            return;
        }
        self.package = None;
        self.model = None;
        self.artifacts.clear();
        self.load_annotations.clear();
        self.state = HarnessState::Disposed;
    }

    fn ensure_not_disposed(&self) -> EngineResult<()> {
        if self.state == HarnessState::Disposed {
            return Err(EngineError::invalid_state("the test harness has been disposed"));
        }
        Ok(())
    }
}
