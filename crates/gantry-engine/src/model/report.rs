//! Immutable run reports and the snapshot box that publishes them

use crate::model::outcome::{LogChannel, Outcome};
use crate::model::tree::{Annotation, TestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// One log line attributed to a test step or to the run itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub channel: LogChannel,
    pub message: String,
}

impl LogEntry {
    pub fn new(channel: LogChannel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
        }
    }
}

/// Final result of one executed test node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: TestId,
    pub name: String,
    pub outcome: Outcome,
    pub duration_ms: u64,
    #[serde(default)]
    pub entries: Vec<LogEntry>,
}

/// Aggregate counters over a run's results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub run_count: usize,
    pub passed: usize,
    pub failed: usize,
    pub inconclusive: usize,
}

impl Statistics {
    pub fn record(&mut self, outcome: Outcome) {
        self.run_count += 1;
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Inconclusive => self.inconclusive += 1,
        }
    }
}

/// Summary of the package a report belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSummary {
    pub name: String,
    pub artifact_count: usize,
    pub load_faults: usize,
}

/// Summary of the explored model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub test_count: usize,
}

/// Immutable snapshot of everything known about a run.
///
/// A fresh snapshot is published at every phase boundary; earlier
/// snapshots are never mutated, so readers get a consistent (if
/// possibly stale) view and never a torn one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub package: Option<PackageSummary>,
    pub model: Option<ModelSummary>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub results: Vec<TestResult>,
    #[serde(default)]
    pub statistics: Statistics,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Aggregate outcome of the root of the executed tree, if any ran
    pub outcome: Option<Outcome>,
}

impl Report {
    /// Results that did not pass
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.outcome.is_failed())
    }
}

/// Thread-safe holder of the latest published report snapshot.
///
/// Writers replace the whole `Arc`; readers clone it. There is no
/// partially-updated state to observe.
#[derive(Debug, Clone)]
pub struct ReportBox {
    inner: Arc<Mutex<Arc<Report>>>,
}

impl ReportBox {
    pub fn new(report: Report) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Arc::new(report))),
        }
    }

    /// Take the latest snapshot
    pub fn read(&self) -> Arc<Report> {
        self.inner.lock().expect("report box poisoned").clone()
    }

    /// Publish a new snapshot, replacing the previous one
    pub fn publish(&self, report: Report) {
        *self.inner.lock().expect("report box poisoned") = Arc::new(report);
    }
}

impl Default for ReportBox {
    fn default() -> Self {
        Self::new(Report::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_tally() {
        let mut stats = Statistics::default();
        stats.record(Outcome::Passed);
        stats.record(Outcome::Failed);
        stats.record(Outcome::Failed);
        stats.record(Outcome::Inconclusive);

        assert_eq!(stats.run_count, 4);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.inconclusive, 1);
    }

    #[test]
    fn report_box_publish_replaces_snapshot() {
        let boxed = ReportBox::default();
        let before = boxed.read();
        assert!(before.package.is_none());

        boxed.publish(Report {
            package: Some(PackageSummary {
                name: "pkg".into(),
                artifact_count: 1,
                load_faults: 0,
            }),
            ..Report::default()
        });

        // The old snapshot is untouched; the new one is visible.
        assert!(before.package.is_none());
        assert_eq!(boxed.read().package.as_ref().unwrap().name, "pkg");
    }

    #[test]
    fn report_serializes_to_json() {
        let mut report = Report::default();
        report.results.push(TestResult {
            test_id: 1,
            name: "adds".into(),
            outcome: Outcome::Passed,
            duration_ms: 3,
            entries: vec![LogEntry::new(LogChannel::Default, "ok")],
        });
        report.statistics.record(Outcome::Passed);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"][0]["outcome"], "passed");
        assert_eq!(json["statistics"]["run_count"], 1);
    }
}
