//! Stock progress presenters
//!
//! Presenters are [`ProgressObserver`]s that render monitor state
//! changes somewhere. The engine ships a no-op presenter and a plain
//! text-log presenter; richer front ends (console bars) live with the
//! embedding tool.

use crate::progress::monitor::{ProgressObserver, ProgressSnapshot};
use std::io::Write;

/// Discards all notifications
#[derive(Debug, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {}

/// Writes task transitions and status changes as plain text lines.
///
/// Useful for build logs and for tests that assert on the rendered
/// stream.
pub struct LogObserver<W: Write + Send> {
    writer: W,
    last_status: String,
}

impl<W: Write + Send> LogObserver<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            last_status: String::new(),
        }
    }

    /// Consume the observer and get the writer back
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ProgressObserver for LogObserver<W> {
    fn task_started(&mut self, snapshot: &ProgressSnapshot) {
        let _ = if snapshot.total_work.is_nan() {
            writeln!(self.writer, "[begin] {}", snapshot.task_name)
        } else {
            writeln!(
                self.writer,
                "[begin] {} ({} units)",
                snapshot.task_name, snapshot.total_work
            )
        };
    }

    fn changed(&mut self, snapshot: &ProgressSnapshot) {
        if !snapshot.status.is_empty() && snapshot.status != self.last_status {
            self.last_status = snapshot.status.clone();
            let _ = writeln!(self.writer, "[status] {}", snapshot.status);
        }
    }

    fn task_finished(&mut self, snapshot: &ProgressSnapshot) {
        let _ = writeln!(self.writer, "[done] {}", snapshot.task_name);
    }
}
