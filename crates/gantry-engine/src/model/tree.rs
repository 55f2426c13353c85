//! The in-memory test model built during exploration

use crate::model::package::TestArtifact;
use crate::pattern::PatternTest;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of a node in the test model, unique within one model.
///
/// Ids are assigned depth-first as subtrees are attached, so they are
/// stable for a given package and framework registration order.
pub type TestId = u32;

/// Kind of a node in the test tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// The synthetic root of the whole model
    Root,
    /// A grouping node (artifact, namespace, suite)
    Group,
    /// A fixture owning set-up/tear-down and child cases
    Fixture,
    /// An individual test case
    Case,
}

/// Descriptive view of one discovered test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestNode {
    pub id: TestId,
    pub name: String,
    pub kind: TestKind,
    /// Reason the node is excluded from execution, if any
    pub ignore_reason: Option<String>,
    pub children: Vec<TestNode>,
}

impl TestNode {
    /// Count this node and all descendants
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TestNode::size).sum::<usize>()
    }

    /// Depth-first search for a node by id
    pub fn find(&self, id: TestId) -> Option<&TestNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// A structured problem recorded against part of the model.
///
/// Load failures attach to an artifact; discovery failures attach to
/// the element the explorer was processing. Annotations never abort
/// the phase that records them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    /// What the annotation is attached to (artifact path or element name)
    pub subject: String,
    pub message: String,
}

impl Annotation {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// The test model for one loaded package.
///
/// Built exactly once, after loading, by aggregating the subtree each
/// registered framework explorer contributes. The model owns both the
/// descriptive node tree and the executable pattern trees behind it.
#[derive(Debug)]
pub struct TestModel {
    root: TestNode,
    suites: Vec<PatternTest>,
    annotations: Vec<Annotation>,
    next_id: TestId,
}

impl TestModel {
    pub(crate) fn new(package_name: &str) -> Self {
        Self {
            root: TestNode {
                id: 0,
                name: package_name.to_string(),
                kind: TestKind::Root,
                ignore_reason: None,
                children: Vec::new(),
            },
            suites: Vec::new(),
            annotations: Vec::new(),
            next_id: 1,
        }
    }

    /// The descriptive root of the tree
    pub fn root(&self) -> &TestNode {
        &self.root
    }

    /// Executable pattern trees, in attachment order
    pub fn suites(&self) -> &[PatternTest] {
        &self.suites
    }

    /// Problems recorded during load and exploration
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Number of nodes excluding the synthetic root
    pub fn test_count(&self) -> usize {
        self.root.size() - 1
    }

    pub(crate) fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Attach one framework-contributed subtree under the root,
    /// assigning ids depth-first and mirroring it into the
    /// descriptive tree
    pub(crate) fn attach_suite(&mut self, mut suite: PatternTest) {
        let mirror = Self::assign_ids(&mut suite, &mut self.next_id);
        self.root.children.push(mirror);
        self.suites.push(suite);
    }

    fn assign_ids(test: &mut PatternTest, next_id: &mut TestId) -> TestNode {
        test.id = *next_id;
        *next_id += 1;

        let children = test
            .children
            .iter_mut()
            .map(|child| Self::assign_ids(child, next_id))
            .collect();

        TestNode {
            id: test.id,
            name: test.name.clone(),
            kind: test.kind,
            ignore_reason: test.ignore_reason.clone(),
            children,
        }
    }
}

/// Builder handed to framework explorers so they can contribute
/// subtrees and record discovery problems without seeing the whole
/// model
pub struct TreeBuilder<'a> {
    model: &'a mut TestModel,
    artifact: &'a TestArtifact,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn new(model: &'a mut TestModel, artifact: &'a TestArtifact) -> Self {
        Self { model, artifact }
    }

    /// The artifact currently being explored
    pub fn artifact(&self) -> &TestArtifact {
        self.artifact
    }

    /// Path of the artifact currently being explored
    pub fn artifact_path(&self) -> &PathBuf {
        &self.artifact.path
    }

    /// Attach a finished pattern subtree to the model
    pub fn attach(&mut self, suite: PatternTest) {
        self.model.attach_suite(suite);
    }

    /// Record a discovery problem; exploration of siblings continues
    pub fn annotate(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.model.add_annotation(Annotation::new(subject, message));
    }
}
