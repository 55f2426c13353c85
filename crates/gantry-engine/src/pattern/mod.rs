//! The declarative pattern-test subsystem: tree nodes, builders with
//! ordered decorators, and the default lifecycle controller

pub mod builder;
pub mod controller;
pub mod state;

pub use builder::{PatternParameterBuilder, PatternTestBuilder};
pub use controller::PatternTestController;
pub use state::PatternTestState;
pub use test::{Action, ActionChain, Fixture, FixtureFactory, PatternTest, PatternTestParameter};
