//! Run reporter - display run results

use colored::*;
use gantry_engine::{LogChannel, Outcome, Report, TestResult};
use std::io::{self, Write};

/// Reporter with output configuration
pub struct RunReporter {
    /// Show a line for every executed node
    verbose: bool,
    /// Disable colored output
    no_color: bool,
}

impl Default for RunReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl RunReporter {
    /// Create a new reporter
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            no_color: false,
        }
    }

    /// Disable colored output
    pub fn with_no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Report a run's results
    pub fn report(&self, report: &Report) {
        if self.no_color {
            colored::control::set_override(false);
        }

        for result in &report.results {
            self.print_result(result);
        }

        // Newline after the dot row before the summary
        if !self.verbose && !report.results.is_empty() {
            println!();
        }

        println!();
        self.print_summary(report);
        self.print_annotations(report);
        self.print_failures(report);

        if self.no_color {
            colored::control::unset_override();
        }
    }

    fn print_result(&self, result: &TestResult) {
        match result.outcome {
            Outcome::Passed => {
                if self.verbose {
                    println!(
                        "{} {} ({} ms)",
                        "PASS".green().bold(),
                        result.name,
                        result.duration_ms
                    );
                } else {
                    print!("{}", ".".green());
                    let _ = io::stdout().flush();
                }
            }
            Outcome::Failed => {
                if self.verbose {
                    println!(
                        "{} {} ({} ms)",
                        "FAIL".red().bold(),
                        result.name,
                        result.duration_ms
                    );
                } else {
                    print!("{}", "F".red().bold());
                    let _ = io::stdout().flush();
                }
            }
            Outcome::Inconclusive => {
                if self.verbose {
                    println!(
                        "{} {} ({} ms)",
                        "INCONCLUSIVE".yellow().bold(),
                        result.name,
                        result.duration_ms
                    );
                } else {
                    print!("{}", "I".yellow().bold());
                    let _ = io::stdout().flush();
                }
            }
        }
    }

    fn print_summary(&self, report: &Report) {
        let stats = &report.statistics;
        println!("{}", "─".repeat(50));

        let verdict = match report.outcome {
            Some(Outcome::Failed) => "FAILED".red().bold(),
            Some(Outcome::Inconclusive) => "INCONCLUSIVE".yellow().bold(),
            _ => "PASSED".green().bold(),
        };

        println!(
            "Run result: {} | {} executed, {} passed, {} failed, {} inconclusive",
            verdict,
            stats.run_count.to_string().bold(),
            stats.passed.to_string().green().bold(),
            if stats.failed > 0 {
                stats.failed.to_string().red().bold()
            } else {
                stats.failed.to_string().normal()
            },
            if stats.inconclusive > 0 {
                stats.inconclusive.to_string().yellow().bold()
            } else {
                stats.inconclusive.to_string().normal()
            }
        );

        if let (Some(started), Some(finished)) = (report.started_at, report.finished_at) {
            let elapsed = finished.signed_duration_since(started);
            println!("Time: {} ms", elapsed.num_milliseconds());
        }
    }

    fn print_annotations(&self, report: &Report) {
        if report.annotations.is_empty() {
            return;
        }

        println!();
        println!("{}", "Annotations:".yellow().bold());
        for annotation in &report.annotations {
            println!("  {} {}", "●".yellow(), annotation.subject);
            println!("    {}", annotation.message.dimmed());
        }
    }

    fn print_failures(&self, report: &Report) {
        let failures: Vec<_> = report.failures().collect();
        if failures.is_empty() {
            return;
        }

        println!();
        println!("{}", "Failures:".red().bold());
        println!();

        for result in failures {
            println!("  {} {}", "●".red(), result.name.bold());
            for entry in &result.entries {
                if entry.channel == LogChannel::Failure {
                    for line in entry.message.lines() {
                        println!("      {}", line.dimmed());
                    }
                }
            }
            println!();
        }
    }
}
