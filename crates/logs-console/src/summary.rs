use prettytable::{Cell, Row, Table};
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::poller::{PollEvent, SessionEnd};
use crate::{Format, TestStatus};

/// Running tally of a polling session, printed once the session ends.
///
/// # Examples
///
/// ```
/// use logs_console::{Format, PollEvent, SessionSummary, TestStatus};
///
/// let mut summary = SessionSummary::new("http://127.0.0.1:6780/feeds/run/logs");
/// summary.record(&PollEvent::Appended {
///     offset: 0,
///     lines: vec!["a".into(), "b".into(), "c".into()],
///     status: Some(TestStatus::Running),
/// });
/// assert_eq!(summary.lines, 3);
/// summary.print(Format::Json);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub url: String,
    pub lines: usize,
    pub polls: usize,
    pub resyncs: usize,
    pub failures: usize,
    pub status: Option<TestStatus>,
    pub end: Option<String>,
    #[serde(serialize_with = "as_secs")]
    pub elapsed: Duration,
    #[serde(skip)]
    started: Instant,
}

fn as_secs<S: serde::Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64())
}

impl SessionSummary {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            lines: 0,
            polls: 0,
            resyncs: 0,
            failures: 0,
            status: None,
            end: None,
            elapsed: Duration::ZERO,
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, event: &PollEvent) {
        match event {
            PollEvent::Appended { lines, status, .. } => {
                self.polls += 1;
                self.lines += lines.len();
                if status.is_some() {
                    self.status = status.clone();
                }
            }
            PollEvent::Resynced { lines, .. } => {
                self.resyncs += 1;
                self.lines = *lines;
            }
            PollEvent::ResyncFailed(_) => self.failures += 1,
            PollEvent::Finished(end) => {
                self.end = Some(describe_end(end).to_string());
                if let SessionEnd::Terminated(Some(status)) = end {
                    self.status = Some(status.clone());
                }
            }
        }
        self.elapsed = self.started.elapsed();
    }

    pub fn print(&self, format: Format) {
        match format {
            Format::Table => {
                println!(
                    "\n=== Session (runtime: {:.2}s) ===",
                    self.elapsed.as_secs_f64()
                );

                let mut table = Table::new();
                table.add_row(Row::new(vec![
                    Cell::new("Feed"),
                    Cell::new("Status"),
                    Cell::new("Lines"),
                    Cell::new("Polls"),
                    Cell::new("Resyncs"),
                    Cell::new("Failures"),
                    Cell::new("End"),
                ]));
                table.add_row(Row::new(vec![
                    Cell::new(&self.url),
                    Cell::new(self.status.as_ref().map(TestStatus::as_str).unwrap_or("-")),
                    Cell::new(&self.lines.to_string()),
                    Cell::new(&self.polls.to_string()),
                    Cell::new(&self.resyncs.to_string()),
                    Cell::new(&self.failures.to_string()),
                    Cell::new(self.end.as_deref().unwrap_or("-")),
                ]));
                table.printstd();
            }
            Format::Json => match serde_json::to_string(self) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize session summary to JSON: {}", e),
            },
            Format::JsonPretty => match serde_json::to_string_pretty(self) {
                Ok(json) => println!("{}", json),
                Err(e) => eprintln!("Failed to serialize session summary to pretty JSON: {}", e),
            },
        }
    }
}

fn describe_end(end: &SessionEnd) -> &'static str {
    match end {
        SessionEnd::Terminated(_) => "terminated",
        SessionEnd::Completed => "completed",
        SessionEnd::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::ResyncReason;

    #[test]
    fn test_record_session() {
        let mut summary = SessionSummary::new("http://localhost/feeds/run/logs");
        summary.record(&PollEvent::Appended {
            offset: 0,
            lines: vec!["a".into(), "b".into()],
            status: Some(TestStatus::Running),
        });
        summary.record(&PollEvent::ResyncFailed("connection refused".into()));
        summary.record(&PollEvent::Resynced {
            reason: ResyncReason::Transport("connection refused".into()),
            lines: 5,
        });
        summary.record(&PollEvent::Appended {
            offset: 5,
            lines: vec!["f".into()],
            status: None,
        });
        summary.record(&PollEvent::Finished(SessionEnd::Terminated(Some(
            TestStatus::Failed,
        ))));

        assert_eq!(summary.lines, 6);
        assert_eq!(summary.polls, 2);
        assert_eq!(summary.resyncs, 1);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.status, Some(TestStatus::Failed));
        assert_eq!(summary.end.as_deref(), Some("terminated"));
    }

    #[test]
    fn test_json_shape() {
        let mut summary = SessionSummary::new("u");
        summary.record(&PollEvent::Finished(SessionEnd::Cancelled));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["url"], "u");
        assert_eq!(json["end"], "cancelled");
        assert_eq!(json["status"], serde_json::Value::Null);
        assert!(json["elapsed"].is_f64());
        assert!(json.get("started").is_none());
    }
}
