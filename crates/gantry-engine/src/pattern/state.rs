//! Per-execution state for one pattern test node

use crate::model::outcome::LogChannel;
use crate::model::report::LogEntry;
use crate::pattern::test::Fixture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Transient state for one node execution.
///
/// The fixture instance is handed off explicitly: a node that defines
/// no factory of its own receives a clone of its parent's instance at
/// initialization.
pub struct PatternTestState {
    test_name: String,
    fixture: Option<Fixture>,
    values: HashMap<String, String>,
    entries: Vec<LogEntry>,
}

impl PatternTestState {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            fixture: None,
            values: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn fixture(&self) -> Option<&Fixture> {
        self.fixture.as_ref()
    }

    pub(crate) fn set_fixture(&mut self, fixture: Option<Fixture>) {
        self.fixture = fixture;
    }

    /// Downcast the fixture instance to a concrete type
    pub fn fixture_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.fixture
            .as_ref()
            .and_then(|f| f.clone().downcast::<T>().ok())
    }

    /// Bind a named slot value for later phases
    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Write a log entry attributed to this node
    pub fn log(&mut self, channel: LogChannel, message: impl Into<String>) {
        self.entries.push(LogEntry::new(channel, message));
    }

    pub(crate) fn take_entries(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.entries)
    }
}

impl fmt::Debug for PatternTestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternTestState")
            .field("test_name", &self.test_name)
            .field("has_fixture", &self.fixture.is_some())
            .field("values", &self.values)
            .finish()
    }
}
