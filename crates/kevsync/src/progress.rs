//! Terminal progress display for sync runs
//!
//! Wraps an indicatif bar that starts as a spinner while the feed downloads
//! and switches to a counted bar for reconciliation and deletion. Log output
//! goes through [`BarWriter`] while the bar is on screen so the two never
//! interleave.

use indicatif::{ProgressBar, ProgressStyle};
use kevsync_sync::{Progress, RecordOutcome, SyncObserver, SyncPhase};
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const BAR_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}";

/// [`SyncObserver`] that renders a progress bar on stderr
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    /// Observer drawing into an existing bar (hidden bars in tests)
    pub fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Log destination that keeps log lines from tearing the bar
    pub fn writer(&self) -> BarWriter {
        BarWriter::new(self.bar.clone())
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn counted(&self, total: usize, message: &'static str) {
        self.bar.set_style(bar_style());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_message(message);
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("█▓▒░"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

impl SyncObserver for ProgressObserver {
    fn on_phase(&self, phase: SyncPhase) {
        match phase {
            SyncPhase::Fetching => self.bar.set_message("Fetching KEV feed"),
            SyncPhase::Validating => self.bar.set_message("Validating KEV feed"),
            SyncPhase::Reconciling { entries } => self.counted(entries, "Reconciling"),
            SyncPhase::Deleting { stale } => self.counted(stale, "Deleting stale records"),
            SyncPhase::Finished => self.finish(),
        }
    }

    fn on_progress(&self, _outcome: RecordOutcome, progress: &Progress) {
        self.bar.set_position(progress.processed as u64);
    }
}

/// Log destination that hides the bar while each event is written to stderr
#[derive(Clone)]
pub struct BarWriter {
    bar: ProgressBar,
}

impl BarWriter {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Write for BarWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for BarWriter {
    type Writer = BarWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden() -> ProgressObserver {
        ProgressObserver::with_bar(ProgressBar::hidden())
    }

    #[test]
    fn test_reconciling_sets_length() {
        let observer = hidden();
        observer.on_phase(SyncPhase::Reconciling { entries: 12 });
        assert_eq!(observer.bar.length(), Some(12));
        assert_eq!(observer.bar.position(), 0);

        let progress = Progress {
            processed: 5,
            total: 12,
            ..Default::default()
        };
        observer.on_progress(RecordOutcome::Created, &progress);
        assert_eq!(observer.bar.position(), 5);
    }

    #[test]
    fn test_deleting_resets_position() {
        let observer = hidden();
        observer.on_phase(SyncPhase::Reconciling { entries: 3 });
        observer.bar.set_position(3);
        observer.on_phase(SyncPhase::Deleting { stale: 2 });
        assert_eq!(observer.bar.length(), Some(2));
        assert_eq!(observer.bar.position(), 0);
    }

    #[test]
    fn test_finished_clears_bar() {
        let observer = hidden();
        observer.on_phase(SyncPhase::Finished);
        assert!(observer.bar.is_finished());
        observer.finish();
    }

    #[test]
    fn test_bar_writer_shares_the_bar() {
        let observer = hidden();
        let writer = observer.writer();
        observer.on_phase(SyncPhase::Reconciling { entries: 4 });

        let mut out = writer.make_writer();
        assert_eq!(out.write(b"log line\n").unwrap(), 9);
        out.flush().unwrap();

        assert_eq!(writer.bar.length(), Some(4));
        assert!(!writer.bar.is_finished());
    }
}
