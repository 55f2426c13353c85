//! Data model: packages, the test tree, outcomes, and reports

pub mod outcome;
pub mod package;
pub mod report;
pub mod tree;

pub use outcome::{Fault, FaultKind, LogChannel, Outcome};
pub use package::{TestArtifact, TestPackage};
pub use report::{
    LogEntry, ModelSummary, PackageSummary, Report, ReportBox, Statistics, TestResult,
};
pub use tree::{Annotation, TestId, TestKind, TestModel, TestNode, TreeBuilder};
