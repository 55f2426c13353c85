//! Asynchronous run supervision: runs, sessions, events, and the
//! formatted-report cache

pub mod events;
pub mod report_cache;
pub mod run;
pub mod session;

pub use events::{EventHandlers, LogMessageEvent, LogSeverity};
pub use report_cache::{default_cache_root, ReportCache};
pub use run::{RunConfig, TestRun, TestRunExtension, TestRunStatus};
pub use session::{SessionManager, TestSession};
