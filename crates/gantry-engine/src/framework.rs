//! Collaborator contracts consumed by the engine
//!
//! Concrete test-framework adapters, environments, listeners and
//! report formatters plug in through these traits; the engine never
//! depends on a specific implementation.

use crate::error::EngineResult;
use crate::model::package::{TestArtifact, TestPackage};
use crate::model::report::{Report, TestResult};
use crate::model::tree::{TestId, TreeBuilder};
use crate::progress::monitor::ProgressMonitor;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Explores loaded artifacts and contributes test subtrees.
///
/// Explorers must be idempotent per artifact and side-effect-free
/// beyond tree construction.
pub trait TestExplorer: Send {
    fn explore_artifact(
        &mut self,
        artifact: &TestArtifact,
        builder: &mut TreeBuilder<'_>,
    ) -> EngineResult<()>;
}

/// A pluggable test framework.
///
/// Frameworks are registered with the harness at construction; each
/// gets to pre-process the package during loading and to contribute
/// one explorer per exploration pass.
pub trait TestFramework: Send + Sync {
    fn name(&self) -> &str;

    /// Pre-load hook, e.g. normalizing package configuration
    fn prepare_package(&self, _package: &TestPackage) -> EngineResult<()> {
        Ok(())
    }

    fn create_explorer(&self) -> Box<dyn TestExplorer>;
}

/// Scoped global state captured around a run (console redirection,
/// fault capture). Releasing the scope restores the prior state
/// exactly once.
pub struct EnvironmentScope {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl EnvironmentScope {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A scope with nothing to restore
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for EnvironmentScope {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Holds acquired scopes and releases them in reverse acquisition
/// order, guaranteed even on unwind.
#[derive(Default)]
pub struct EnvironmentScopes {
    scopes: Vec<EnvironmentScope>,
}

impl EnvironmentScopes {
    pub fn push(&mut self, scope: EnvironmentScope) {
        self.scopes.push(scope);
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Drop for EnvironmentScopes {
    fn drop(&mut self) {
        while let Some(scope) = self.scopes.pop() {
            drop(scope);
        }
    }
}

/// Scoped set-up/tear-down around a run
pub trait TestEnvironment: Send + Sync {
    fn name(&self) -> &str;
    fn set_up(&self) -> EngineResult<EnvironmentScope>;
}

/// Phase of a harness-driven run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Load,
    Explore,
    Run,
    Unload,
}

/// Identifies a test step in listener callbacks
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub id: TestId,
    pub name: String,
}

/// Structured run events, delivered synchronously on the worker
/// thread in phase order
pub trait TestListener: Send {
    fn phase_started(&mut self, _phase: RunPhase) {}
    fn phase_finished(&mut self, _phase: RunPhase) {}
    fn step_started(&mut self, _step: &StepInfo) {}
    fn step_finished(&mut self, _step: &StepInfo, _result: &TestResult) {}
}

/// Discards all events
#[derive(Debug, Default)]
pub struct NullListener;

impl TestListener for NullListener {}

/// Materializes formatted report artifacts.
///
/// The engine calls this on demand only; it does not depend on any
/// specific format.
pub trait ReportManager: Send + Sync {
    /// Whether `format` is one this manager can produce
    fn supports(&self, format: &str) -> bool;

    /// File extension for artifacts of `format`
    fn file_extension(&self, format: &str) -> &str;

    fn write_report(
        &self,
        report: &Report,
        format: &str,
        writer: &mut dyn Write,
        monitor: &ProgressMonitor,
    ) -> EngineResult<()>;
}

/// The built-in JSON formatter
#[derive(Debug, Default)]
pub struct JsonReportManager;

impl ReportManager for JsonReportManager {
    fn supports(&self, format: &str) -> bool {
        format == "json"
    }

    fn file_extension(&self, _format: &str) -> &str {
        "json"
    }

    fn write_report(
        &self,
        report: &Report,
        format: &str,
        writer: &mut dyn Write,
        monitor: &ProgressMonitor,
    ) -> EngineResult<()> {
        if !self.supports(format) {
            return Err(crate::error::EngineError::UnknownFormat(format.to_string()));
        }

        monitor.begin_task("Formatting report", f64::NAN)?;
        serde_json::to_writer_pretty(&mut *writer, report)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        writer.write_all(b"\n")?;
        monitor.done();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn scopes_release_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let mut scopes = EnvironmentScopes::default();
            for label in ["console", "trace", "faults"] {
                let order = order.clone();
                scopes.push(EnvironmentScope::new(move || {
                    order.lock().unwrap().push(label)
                }));
            }
        }
        assert_eq!(*order.lock().unwrap(), vec!["faults", "trace", "console"]);
    }

    #[test]
    fn scope_releases_exactly_once() {
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let scope = EnvironmentScope::new(move || *c.lock().unwrap() += 1);
        drop(scope);
        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn json_manager_writes_report() {
        let manager = JsonReportManager;
        assert!(manager.supports("json"));
        assert!(!manager.supports("html"));

        let mut out = Vec::new();
        let monitor = ProgressMonitor::new();
        manager
            .write_report(&Report::default(), "json", &mut out, &monitor)
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value.get("statistics").is_some());
        assert!(monitor.is_done());
    }

    #[test]
    fn json_manager_rejects_unknown_format() {
        let manager = JsonReportManager;
        let mut out = Vec::new();
        let monitor = ProgressMonitor::new();
        let err = manager
            .write_report(&Report::default(), "html", &mut out, &monitor)
            .unwrap_err();
        assert!(matches!(err, crate::error::EngineError::UnknownFormat(_)));
    }
}
