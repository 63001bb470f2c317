//! Transfer progress and E.T.A.

use chrono::{DateTime, Local, TimeDelta};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Running counters of a transfer.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Documents written so far.
    pub done: u64,
    /// Documents in the source when the scroll was opened. May be stale if
    /// the source is written to during the copy.
    pub total: u64,
    /// Wall-clock start of the transfer.
    pub started_at: DateTime<Local>,
}

impl TransferProgress {
    /// Starts counting at `started_at`.
    pub fn new(total: u64, started_at: DateTime<Local>) -> Self {
        Self {
            done: 0,
            total,
            started_at,
        }
    }

    /// Adds a flushed batch.
    pub fn record(&mut self, documents: u64) {
        self.done = self.done.saturating_add(documents);
    }

    /// Completion percentage; an empty source counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            100.0 * self.done as f64 / self.total as f64
        }
    }

    /// Linear projection of the completion time, `None` before the first
    /// document.
    pub fn eta(&self, elapsed: Duration) -> Option<DateTime<Local>> {
        if self.done == 0 {
            return None;
        }
        let projected = elapsed.as_secs_f64() * self.total as f64 / self.done as f64;
        let projected = Duration::try_from_secs_f64(projected).ok()?;
        let delta = TimeDelta::from_std(projected).ok()?;
        self.started_at.checked_add_signed(delta)
    }

    /// Progress line shown while copying.
    pub fn status_line(&self, elapsed: Duration) -> String {
        let eta = self
            .eta(elapsed)
            .map_or_else(|| "unknown".to_string(), |eta| eta.format("%Y-%m-%d %H:%M:%S").to_string());
        format!(
            "    {}/{} ({:.1}%) done in {}, E.T.A.: {}.",
            self.done,
            self.total,
            self.percent(),
            format_elapsed(elapsed),
            eta
        )
    }

    /// Line shown once the scroll is exhausted.
    pub fn summary_line(&self, elapsed: Duration) -> String {
        format!(
            "    {}/{} done in {}.",
            self.done,
            self.total,
            format_elapsed(elapsed)
        )
    }
}

/// `H:MM:SS`, prefixed with `N days, ` once past a day.
pub fn format_elapsed(elapsed: Duration) -> String {
    let mut secs = elapsed.as_secs();
    let days = secs / 86_400;
    secs %= 86_400;
    let hours = secs / 3_600;
    secs %= 3_600;
    let minutes = secs / 60;
    secs %= 60;

    let clock = format!("{hours}:{minutes:02}:{secs:02}");
    if days == 0 {
        clock
    } else {
        format!("{days} days, {clock}")
    }
}

/// Renders [`TransferProgress`] as a single line rewritten in place.
pub struct ProgressTracker {
    progress: TransferProgress,
    clock: Instant,
    bar: ProgressBar,
}

impl ProgressTracker {
    /// Tracker drawing on stdout.
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stdout());
        Self::with_bar(total, bar)
    }

    /// Tracker that draws nothing.
    pub fn hidden(total: u64) -> Self {
        Self::with_bar(total, ProgressBar::hidden())
    }

    fn with_bar(total: u64, bar: ProgressBar) -> Self {
        bar.set_style(ProgressStyle::with_template("{msg}").unwrap_or_else(|_| ProgressStyle::default_bar()));
        let progress = TransferProgress::new(total, Local::now());
        bar.set_message(progress.status_line(Duration::ZERO));

        Self {
            progress,
            clock: Instant::now(),
            bar,
        }
    }

    /// Counts a flushed batch and redraws the line.
    pub fn record(&mut self, documents: u64) {
        self.progress.record(documents);
        self.bar.set_position(self.progress.done);
        self.bar
            .set_message(self.progress.status_line(self.clock.elapsed()));
    }

    /// Current counters.
    pub fn progress(&self) -> &TransferProgress {
        &self.progress
    }

    /// Time since the tracker started.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Replaces the progress line with the summary.
    pub fn finish(&self) {
        self.bar
            .finish_with_message(self.progress.summary_line(self.clock.elapsed()));
    }
}
