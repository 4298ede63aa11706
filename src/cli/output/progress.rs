//! Live progress rendering using indicatif.

use std::sync::Mutex;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::ports::{ProgressEvent, ProgressListener, WorkerState};

const PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg} (ETA: {eta})";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Renders orchestrator progress events as a terminal progress bar.
///
/// Quiet mode (JSON output) prints one JSON line per event instead so
/// machine consumers can follow along.
pub struct ConsoleProgressListener {
    bar: Mutex<Option<ProgressBar>>,
    json_mode: bool,
}

impl ConsoleProgressListener {
    pub fn new(json_mode: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            json_mode,
        }
    }
}

impl ProgressListener for ConsoleProgressListener {
    fn on_event(&self, event: &ProgressEvent) {
        if self.json_mode {
            if let Ok(line) = serde_json::to_string(event) {
                eprintln!("{line}");
            }
            return;
        }

        let mut bar = match self.bar.lock() {
            Ok(bar) => bar,
            Err(_) => return,
        };
        match event {
            ProgressEvent::ExecutionStarted { total, workers } => {
                let pb = ProgressBar::new(*total as u64);
                if let Ok(template) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
                    pb.set_style(template.progress_chars(PROGRESS_CHARS));
                }
                pb.enable_steady_tick(Duration::from_millis(100));
                pb.set_message(format!("{workers} workers"));
                *bar = Some(pb);
            }
            ProgressEvent::WorkerStatus {
                worker_id,
                state: WorkerState::Running,
                test_id: Some(test_id),
            } => {
                if let Some(pb) = bar.as_ref() {
                    pb.set_message(format!("w{worker_id}: {test_id}"));
                }
            }
            ProgressEvent::WorkerStatus { .. } => {}
            ProgressEvent::TestCompleted {
                test_id, passed, ..
            } => {
                if let Some(pb) = bar.as_ref() {
                    let mark = if *passed {
                        style("PASS").green()
                    } else {
                        style("FAIL").red()
                    };
                    pb.println(format!("  {mark} {test_id}"));
                    pb.inc(1);
                }
            }
            ProgressEvent::ExecutionCompleted { counters } => {
                if let Some(pb) = bar.take() {
                    pb.finish_with_message(format!(
                        "{} passed, {} failed, {} errored",
                        counters.passed, counters.failed, counters.errored
                    ));
                }
            }
        }
    }
}
