use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use starcloud::ProgressSink;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Terminal progress: one bar per file, drawn on stderr.
///
/// A spinner with a byte counter is shown when the server sends no length.
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
    label: Mutex<String>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            label: Mutex::new(String::new()),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn label(&self) -> String {
        self.label.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "  {msg} [{bar:30.cyan/dim}] {bytes}/{total_bytes} {percent:>3}% ({bytes_per_sec}, {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━╸─")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.cyan} {msg} {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(TICK_CHARS)
}

impl ProgressSink for BarProgress {
    fn begin_file(&self, position: usize, count: usize, filename: &str) {
        if let Ok(mut label) = self.label.lock() {
            *label = format!("[{position}/{count}] {filename}");
        }
    }

    fn on_length(&self, total: Option<u64>) {
        let pb = match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                pb.set_style(bar_style());
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(spinner_style());
                pb.enable_steady_tick(Duration::from_millis(80));
                pb
            }
        };
        pb.set_message(self.label());
        self.set_bar(pb);
    }

    fn on_bytes(&self, downloaded: u64, _total: Option<u64>) {
        if let Ok(guard) = self.bar.lock()
            && let Some(pb) = guard.as_ref()
        {
            pb.set_position(downloaded);
        }
    }

    fn end_file(&self, succeeded: bool) {
        let label = self.label();
        if let Ok(mut guard) = self.bar.lock()
            && let Some(pb) = guard.take()
        {
            pb.finish_and_clear();
        }
        if succeeded {
            eprintln!("  \x1b[32m✓\x1b[0m {label}");
        } else {
            eprintln!("  \x1b[31m✗\x1b[0m {label}");
        }
    }
}
