//! Terminal progress bars for the per-file ingest phases.
//!
//! Bars draw to stderr and are hidden automatically when stderr is not a
//! terminal. A disabled [`Progress`] holds no bar at all, so library callers
//! that never ask for progress pay nothing.

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{msg:>18} {wide_bar:.cyan/blue} {pos}/{len} [{elapsed_precise}]";

/// An optional progress bar over a known number of steps.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    /// A bar over `total` steps labelled `message`, or nothing when
    /// `enabled` is false.
    #[must_use]
    pub fn bar(enabled: bool, total: u64, message: &str) -> Self {
        if !enabled {
            return Self::hidden();
        }

        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(message.to_string());
        Self { bar: Some(bar) }
    }

    /// A progress handle that reports nothing.
    #[must_use]
    pub fn hidden() -> Self {
        Self { bar: None }
    }

    /// Advance by `delta` steps.
    pub fn inc(&self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
