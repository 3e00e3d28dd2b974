//! Terminal output for the monitor.
//!
//! The console display prints one line whenever a workflow changes state and
//! keeps a single status line (counts plus next-check countdown) at the bottom.

use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::platform::types::{Conclusion, RunStatus, Summary, WorkflowRun};

/// Where the monitor reports progress.
pub trait Display {
    fn update(&mut self, runs: &[WorkflowRun], last_update: Instant, interval: Duration);

    /// Called on every non-initial poll that found no runs.
    fn show_waiting(&mut self, commit_sha: &str, repo_name: &str);

    fn show_countdown(&mut self, _remaining: Duration) {}

    fn show_final_summary(&mut self, _summary: &Summary) {}
}

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

pub struct ConsoleDisplay {
    out: Box<dyn Write + Send>,
    interactive: bool,
    last_runs: HashMap<String, WorkflowRun>,
    status_parts: Vec<String>,
    has_workflows: bool,
    waiting_shown: bool,
}

impl ConsoleDisplay {
    pub fn stdout() -> Self {
        let interactive = io::stdout().is_terminal();
        Self::new(Box::new(io::stdout()), interactive)
    }

    pub fn new(out: Box<dyn Write + Send>, interactive: bool) -> Self {
        Self {
            out,
            interactive,
            last_runs: HashMap::new(),
            status_parts: Vec::new(),
            has_workflows: false,
            waiting_shown: false,
        }
    }

    /// Print the monitoring header.
    pub fn show_header(&mut self, repo_name: &str, commit_sha: &str) {
        let short = commit_sha.get(..7).unwrap_or(commit_sha);
        self.write(&format!("🔍 Monitoring {repo_name} @ {short}\n"));
    }

    fn write(&mut self, text: &str) {
        // Terminal write failures are not worth aborting the monitor for.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }

    fn clear_status_line(&mut self) {
        if self.interactive && !self.status_parts.is_empty() {
            self.write("\r\x1b[K");
        }
    }

    fn render_status_line(&mut self, remaining: Duration) {
        if self.status_parts.is_empty() {
            return;
        }
        let time_info = if remaining.is_zero() {
            "checking...".to_string()
        } else {
            format!("next: {}s", remaining.as_secs_f64().round() as u64)
        };
        let line = format!("[{} | {}]", self.status_parts.join(" "), time_info);
        if self.interactive {
            self.write(&format!("\r\x1b[K{line}"));
        } else {
            self.write(&format!("{line}\n"));
        }
    }
}

impl Display for ConsoleDisplay {
    fn update(&mut self, runs: &[WorkflowRun], last_update: Instant, interval: Duration) {
        if runs.is_empty() {
            return;
        }
        self.has_workflows = true;

        let current = latest_by_name(runs);

        let mut changed: Vec<&WorkflowRun> = current
            .values()
            .filter(|run| {
                self.last_runs
                    .get(&run.name)
                    .map_or(true, |last| last.status != run.status || last.conclusion != run.conclusion)
            })
            .collect();
        changed.sort_by(|a, b| a.name.cmp(&b.name));

        let lines: Vec<String> = changed.iter().map(|run| status_line(run)).collect();
        self.clear_status_line();
        for line in lines {
            self.write(&format!("{line}\n"));
        }

        self.status_parts = summary_parts(&current);
        self.last_runs = current;

        let remaining = interval.saturating_sub(last_update.elapsed());
        self.render_status_line(remaining);
    }

    fn show_waiting(&mut self, commit_sha: &str, repo_name: &str) {
        if self.has_workflows || self.waiting_shown {
            return;
        }
        self.waiting_shown = true;
        let short = commit_sha.get(..7).unwrap_or(commit_sha);
        self.write(&format!("⏳ Waiting for workflows on {repo_name} @ {short}...\n"));
    }

    fn show_countdown(&mut self, remaining: Duration) {
        if self.interactive {
            self.render_status_line(remaining);
        }
    }

    fn show_final_summary(&mut self, summary: &Summary) {
        self.clear_status_line();
        self.status_parts.clear();

        let mut text = format!("\n{RULE}\n🎉 All workflows completed!\n{RULE}\n");
        text.push_str(&format!("Total runs: {}\n", summary.total_runs));
        text.push_str(&format!("✅ Success: {}\n", summary.success_count));
        if summary.failure_count > 0 {
            text.push_str(&format!("❌ Failed: {}\n", summary.failure_count));
        }
        if summary.other_count > 0 {
            text.push_str(&format!("⚠️  Other: {}\n", summary.other_count));
        }
        text.push_str(&format!("Duration: {}\n", humantime::format_duration(summary.duration)));
        self.write(&text);
    }
}

/// One entry per workflow name; the most recently updated run wins.
fn latest_by_name(runs: &[WorkflowRun]) -> HashMap<String, WorkflowRun> {
    let mut latest: HashMap<String, WorkflowRun> = HashMap::new();
    for run in runs {
        match latest.get(&run.name) {
            Some(existing) if existing.updated_at >= run.updated_at => {}
            _ => {
                latest.insert(run.name.clone(), run.clone());
            }
        }
    }
    latest
}

fn icon(run: &WorkflowRun) -> &'static str {
    match (&run.status, &run.conclusion) {
        (RunStatus::Completed, Some(Conclusion::Success)) => "✅",
        (RunStatus::Completed, Some(Conclusion::Failure)) => "❌",
        (RunStatus::Completed, Some(Conclusion::Cancelled)) => "⚪",
        (RunStatus::Completed, Some(Conclusion::Skipped)) => "⏭️",
        (RunStatus::InProgress, _) => "🔄",
        (RunStatus::Queued, _) => "⏳",
        _ => "❓",
    }
}

pub fn status_line(run: &WorkflowRun) -> String {
    let state = match (&run.status, &run.conclusion) {
        (RunStatus::Completed, Some(conclusion)) => conclusion.as_str(),
        (status, _) => status.as_str(),
    };
    let time_info = match run.status {
        RunStatus::Completed => {
            let ago = (Utc::now() - run.updated_at).num_seconds().max(0);
            match ago {
                s if s < 60 => format!("{s}s ago"),
                s if s < 3600 => format!("{}m ago", s / 60),
                s => format!("{}h ago", s / 3600),
            }
        }
        RunStatus::InProgress => "running...".to_string(),
        _ => "queued...".to_string(),
    };
    format!("{} {} [{}] {}", icon(run), run.name, state, time_info)
}

fn summary_parts(runs: &HashMap<String, WorkflowRun>) -> Vec<String> {
    let (mut completed, mut failed, mut running) = (0, 0, 0);
    for run in runs.values() {
        match (&run.status, &run.conclusion) {
            (RunStatus::Completed, Some(Conclusion::Failure)) => failed += 1,
            (RunStatus::Completed, _) => completed += 1,
            (RunStatus::InProgress | RunStatus::Queued, _) => running += 1,
            _ => {}
        }
    }

    let mut parts = Vec::new();
    if completed > 0 {
        parts.push(format!("✅ {completed} completed"));
    }
    if failed > 0 {
        parts.push(format!("❌ {failed} failed"));
    }
    if running > 0 {
        parts.push(format!("🔄 {running} running"));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::types::fixtures::*;
    use std::sync::{Arc, Mutex};

    /// Clonable in-memory sink.
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
        }
    }

    fn display() -> (ConsoleDisplay, Buffer) {
        let buffer = Buffer::default();
        (ConsoleDisplay::new(Box::new(buffer.clone()), false), buffer)
    }

    #[test]
    fn test_prints_only_changed_runs() {
        let (mut display, out) = display();
        let interval = Duration::from_secs(5);

        display.update(&[queued(1, "build"), queued(2, "test")], Instant::now(), interval);
        let first = out.take();
        assert!(first.contains("⏳ build [queued] queued..."));
        assert!(first.contains("⏳ test [queued]"));
        assert!(first.contains("🔄 2 running"));

        display.update(&[in_progress(1, "build"), queued(2, "test")], Instant::now(), interval);
        let second = out.take();
        assert!(second.contains("🔄 build [in_progress] running..."));
        assert!(!second.contains("test [queued]"));
    }

    #[test]
    fn test_duplicate_names_keep_latest() {
        let mut old = completed(1, "build", Conclusion::Failure);
        old.updated_at = Utc::now() - chrono::Duration::minutes(10);
        let new = in_progress(2, "build");

        let latest = latest_by_name(&[new.clone(), old]);

        assert_eq!(latest.len(), 1);
        assert_eq!(latest["build"].id, new.id);
    }

    #[test]
    fn test_status_counts() {
        let (mut display, out) = display();
        display.update(
            &[
                completed(1, "build", Conclusion::Success),
                completed(2, "test", Conclusion::Failure),
                completed(3, "lint", Conclusion::Skipped),
                in_progress(4, "deploy"),
            ],
            Instant::now(),
            Duration::from_secs(5),
        );

        let text = out.take();
        assert!(text.contains("[✅ 2 completed ❌ 1 failed 🔄 1 running | next: 5s]"), "{text}");
    }

    #[test]
    fn test_waiting_line_shown_once_and_only_before_runs() {
        let (mut display, out) = display();

        display.show_waiting("0123456789abcdef", "octo/repo");
        display.show_waiting("0123456789abcdef", "octo/repo");
        assert_eq!(out.take(), "⏳ Waiting for workflows on octo/repo @ 0123456...\n");

        let (mut display, out) = self::display();
        display.update(&[queued(1, "build")], Instant::now(), Duration::from_secs(5));
        out.take();
        display.show_waiting("0123456789abcdef", "octo/repo");
        assert_eq!(out.take(), "");
    }

    #[test]
    fn test_final_summary() {
        let (mut display, out) = display();
        display.show_final_summary(&Summary {
            total_runs: 3,
            success_count: 1,
            failure_count: 1,
            other_count: 1,
            duration: Duration::from_secs(95),
        });

        let text = out.take();
        assert!(text.contains("🎉 All workflows completed!"));
        assert!(text.contains("Total runs: 3"));
        assert!(text.contains("❌ Failed: 1"));
        assert!(text.contains("⚠️  Other: 1"));
        assert!(text.contains("Duration: 1m 35s"));
    }
}
