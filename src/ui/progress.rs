//! Terminal progress reporting.
//!
//! Wraps `indicatif` behind the engine's reporter capability. The engine
//! drives it between header phases and at every chunk boundary; the bar
//! handles throttling and terminal management on its own.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use indicatif::{ProgressBar as Bar, ProgressStyle as Style};

use crate::engine::Reporter;

/// Template: spinner, phase message, bar, byte counters, speed, ETA.
const PROGRESS_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Reporter backed by an indicatif progress bar.
pub struct TermReporter {
    bar: Bar,
    cancelled: AtomicBool,
}

impl TermReporter {
    /// Creates the bar with application styling.
    ///
    /// # Errors
    /// Fails if the progress template is malformed.
    pub fn new() -> Result<Self> {
        let bar = Bar::new(0);
        bar.set_style(Style::with_template(PROGRESS_TEMPLATE)?.progress_chars("●○ "));

        Ok(Self { bar, cancelled: AtomicBool::new(false) })
    }

    /// Requests cancellation of the running call.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Finishes and clears the bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Reporter for TermReporter {
    fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_owned());
    }

    fn set_progress(&self, done: u64, total: u64) {
        if self.bar.length() != Some(total) {
            self.bar.set_length(total);
        }
        self.bar.set_position(done);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag() {
        let reporter = TermReporter::new().unwrap();
        assert!(!reporter.is_cancelled());
        reporter.cancel();
        assert!(reporter.is_cancelled());
        reporter.finish();
    }

    #[test]
    fn test_progress_updates() {
        let reporter = TermReporter::new().unwrap();
        reporter.set_status("Encrypting");
        reporter.set_progress(0, 100);
        reporter.set_progress(50, 100);
        reporter.finish();
    }
}
