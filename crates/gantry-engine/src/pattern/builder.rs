//! Builders for pattern tests and their parameters
//!
//! Framework adapters construct subtrees through these builders.
//! Decorators queue with an integer order key and are applied exactly
//! once, sorted ascending (stable for ties), before the tree is
//! handed to the model.

use crate::model::outcome::Fault;
use crate::model::tree::TestKind;
use crate::pattern::state::PatternTestState;
use crate::pattern::test::{
    Action, Fixture, FixtureFactory, PatternTest, PatternTestParameter,
};

type TestDecorator = Box<dyn FnOnce(&mut PatternTestBuilder) + Send>;
type ParameterDecorator = Box<dyn FnOnce(&mut PatternParameterBuilder) + Send>;

/// Builds one pattern test node
pub struct PatternTestBuilder {
    test: PatternTest,
    decorators: Vec<(i32, TestDecorator)>,
}

impl PatternTestBuilder {
    pub fn new(name: impl Into<String>, kind: TestKind) -> Self {
        Self {
            test: PatternTest::new(name, kind),
            decorators: Vec::new(),
        }
    }

    /// A grouping node
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, TestKind::Group)
    }

    /// A fixture node
    pub fn fixture(name: impl Into<String>) -> Self {
        Self::new(name, TestKind::Fixture)
    }

    /// A test case node
    pub fn case(name: impl Into<String>) -> Self {
        Self::new(name, TestKind::Case)
    }

    pub fn name(&self) -> &str {
        self.test.name()
    }

    /// Exclude the node from execution, recording the reason
    pub fn set_ignore(&mut self, reason: impl Into<String>) -> &mut Self {
        self.test.ignore_reason = Some(reason.into());
        self
    }

    /// Install the factory that constructs this node's fixture
    /// instance. Nodes without a factory inherit the parent instance.
    pub fn set_fixture_factory(
        &mut self,
        factory: impl Fn() -> Result<Fixture, Fault> + Send + Sync + 'static,
    ) -> &mut Self {
        self.test.fixture_factory = Some(Box::new(factory) as FixtureFactory);
        self
    }

    /// Append to the node's set-up chain
    pub fn add_set_up(
        &mut self,
        action: impl Fn(&mut PatternTestState) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> &mut Self {
        self.test.set_up.push(Box::new(action) as Action);
        self
    }

    /// Append to the node's execute chain
    pub fn add_execute(
        &mut self,
        action: impl Fn(&mut PatternTestState) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> &mut Self {
        self.test.execute.push(Box::new(action) as Action);
        self
    }

    /// Append to the node's tear-down chain
    pub fn add_tear_down(
        &mut self,
        action: impl Fn(&mut PatternTestState) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> &mut Self {
        self.test.tear_down.push(Box::new(action) as Action);
        self
    }

    /// Append to the hook run before each child's set-up
    pub fn add_before_child(
        &mut self,
        action: impl Fn(&mut PatternTestState) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> &mut Self {
        self.test.before_child.push(Box::new(action) as Action);
        self
    }

    /// Append to the hook run after each child's tear-down
    pub fn add_after_child(
        &mut self,
        action: impl Fn(&mut PatternTestState) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> &mut Self {
        self.test.after_child.push(Box::new(action) as Action);
        self
    }

    /// Append a finished child subtree
    pub fn add_child(&mut self, child: PatternTest) -> &mut Self {
        self.test.children.push(child);
        self
    }

    /// Append a parameter slot
    pub fn add_parameter(&mut self, parameter: PatternTestParameter) -> &mut Self {
        self.test.parameters.push(parameter);
        self
    }

    /// Queue a decorator with an order key. Lower keys run first;
    /// equal keys run in insertion order.
    pub fn add_decorator(
        &mut self,
        order: i32,
        decorator: impl FnOnce(&mut PatternTestBuilder) + Send + 'static,
    ) -> &mut Self {
        self.decorators.push((order, Box::new(decorator)));
        self
    }

    /// Apply all queued decorators exactly once, then discard the
    /// queue. Decorators queued while the application runs are
    /// discarded, not applied.
    pub fn apply_decorators(&mut self) {
        let mut queue = std::mem::take(&mut self.decorators);
        queue.sort_by_key(|(order, _)| *order);
        for (_, decorator) in queue {
            decorator(self);
        }
        self.decorators.clear();
    }

    /// Apply any pending decorators and yield the finished node
    pub fn build(mut self) -> PatternTest {
        self.apply_decorators();
        self.test
    }
}

/// Builds one pattern test parameter
pub struct PatternParameterBuilder {
    parameter: PatternTestParameter,
    decorators: Vec<(i32, ParameterDecorator)>,
}

impl PatternParameterBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            parameter: PatternTestParameter::new(name),
            decorators: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.parameter.name
    }

    /// Rename the parameter slot
    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.parameter.name = name.into();
        self
    }

    /// Queue a decorator with an order key; same rules as test
    /// decorators
    pub fn add_decorator(
        &mut self,
        order: i32,
        decorator: impl FnOnce(&mut PatternParameterBuilder) + Send + 'static,
    ) -> &mut Self {
        self.decorators.push((order, Box::new(decorator)));
        self
    }

    /// Apply all queued decorators exactly once, then discard the queue
    pub fn apply_decorators(&mut self) {
        let mut queue = std::mem::take(&mut self.decorators);
        queue.sort_by_key(|(order, _)| *order);
        for (_, decorator) in queue {
            decorator(self);
        }
        self.decorators.clear();
    }

    pub fn build(mut self) -> PatternTestParameter {
        self.apply_decorators();
        self.parameter
    }
}
