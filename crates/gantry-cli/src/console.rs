//! Console progress presenter backed by indicatif

use gantry_engine::{ProgressObserver, ProgressSnapshot};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Renders a run's root progress monitor as a terminal spinner with a
/// percentage and the deepest active status line.
pub struct ConsoleObserver {
    spinner: ProgressBar,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn render(&self, snapshot: &ProgressSnapshot) {
        let detail = if !snapshot.status.is_empty() {
            snapshot.status.as_str()
        } else if let Some(child) = &snapshot.child_task {
            child.as_str()
        } else {
            snapshot.task_name.as_str()
        };

        match snapshot.fraction() {
            Some(fraction) => self.spinner.set_message(format!(
                "{} [{:>3.0}%] {}",
                snapshot.task_name,
                fraction * 100.0,
                detail
            )),
            None => self
                .spinner
                .set_message(format!("{} {}", snapshot.task_name, detail)),
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ConsoleObserver {
    fn task_started(&mut self, snapshot: &ProgressSnapshot) {
        self.render(snapshot);
    }

    fn changed(&mut self, snapshot: &ProgressSnapshot) {
        self.render(snapshot);
    }

    fn task_finished(&mut self, _snapshot: &ProgressSnapshot) {
        self.spinner.finish_and_clear();
    }
}
