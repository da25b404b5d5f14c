use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

pub mod error;
pub mod feed;
pub mod fetch;
pub mod format;
pub mod poller;
pub mod summary;
pub mod target;

mod http_api;

pub use error::{PollError, ServeError};
pub use feed::{FeedSummary, LogFeed};
pub use fetch::{FetchLogs, FetchRequest, HttpFetcher};
pub use format::{classify, format_log, Emphasis, FormattedLine, Outcome};
pub use http_api::FeedServer;
pub use poller::{
    spawn, PollEvent, PollHandle, PollOutcome, PollState, Poller, PollerConfig, ResyncReason,
    SessionEnd, Toggle,
};
pub use summary::SessionSummary;
pub use target::{RenderTarget, RenderedLine, SharedTarget};

cfg_if::cfg_if! {
    if #[cfg(feature = "tokio")] {
        pub mod async_poller;
        pub use async_poller::{spawn_async, AsyncPollHandle};
    }
}

/// Status reported by a log feed. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TestStatus {
    #[default]
    Queued,
    Running,
    Success,
    Failed,
    Error,
    Other(String),
}

impl TestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TestStatus::Queued => "queued",
            TestStatus::Running => "running",
            TestStatus::Success => "success",
            TestStatus::Failed => "failed",
            TestStatus::Error => "error",
            TestStatus::Other(s) => s.as_str(),
        }
    }

    /// `success`, `failed` and `error` end a polling session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TestStatus::Success | TestStatus::Failed | TestStatus::Error
        )
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for TestStatus {
    fn from(s: &str) -> Self {
        match s {
            "queued" => TestStatus::Queued,
            "running" => TestStatus::Running,
            "success" => TestStatus::Success,
            "failed" => TestStatus::Failed,
            "error" => TestStatus::Error,
            other => TestStatus::Other(other.to_string()),
        }
    }
}

impl Serialize for TestStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TestStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(TestStatus::from(s.as_str()))
    }
}

/// Wire protocol spoken by a log endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `?start=N`; the session ends on a terminal `status_string` once
    /// `logs_count == end + 1`.
    #[default]
    Status,
    /// `?from=N`; a non-null `done` asks for a full reload.
    DoneFlag,
}

impl Dialect {
    /// Query parameter carrying the number of already rendered lines.
    pub fn offset_param(&self) -> &'static str {
        match self {
            Dialect::Status => "start",
            Dialect::DoneFlag => "from",
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(Dialect::Status),
            "done-flag" => Ok(Dialect::DoneFlag),
            other => Err(format!("unknown dialect: {}", other)),
        }
    }
}

/// One response of a log endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogBatch {
    #[serde(default, deserialize_with = "lines_or_empty")]
    pub logs: Vec<String>,
    #[serde(default)]
    pub start: usize,
    /// Index of the last line delivered, `logs_count - 1` for an empty slice.
    #[serde(default)]
    pub end: i64,
    #[serde(default)]
    pub logs_count: usize,
    #[serde(default)]
    pub status_string: Option<TestStatus>,
    #[serde(default)]
    pub done: Option<serde_json::Value>,
}

impl LogBatch {
    /// Whether every line the server knows of has been delivered.
    pub fn is_complete_range(&self) -> bool {
        self.logs_count as i64 == self.end + 1
    }

    /// Terminal per the status dialect: finished status and full range.
    pub fn is_terminal(&self) -> bool {
        let finished = self
            .status_string
            .as_ref()
            .map(TestStatus::is_terminal)
            .unwrap_or(false);
        finished && self.is_complete_range()
    }

    pub fn is_done(&self) -> bool {
        self.done.is_some()
    }
}

fn lines_or_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

/// Output format of a session summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Table,
    Json,
    JsonPretty,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Format::Table),
            "json" => Ok(Format::Json),
            "json-pretty" => Ok(Format::JsonPretty),
            other => Err(format!("unknown format: {}", other)),
        }
    }
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_FEED_PORT: u16 = 6780;

/// Poll interval from `LOGS_CONSOLE_POLL_INTERVAL` (seconds), 10s otherwise.
pub fn get_poll_interval() -> Duration {
    std::env::var("LOGS_CONSOLE_POLL_INTERVAL")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_POLL_INTERVAL)
}

/// Feed server port from `LOGS_CONSOLE_PORT`, 6780 otherwise.
pub fn get_feed_port() -> u16 {
    std::env::var("LOGS_CONSOLE_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_FEED_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_open_set() {
        let statuses: Vec<TestStatus> =
            serde_json::from_str(r#"["running","success","failed","error","cancelled"]"#)
                .unwrap();
        assert_eq!(
            statuses,
            vec![
                TestStatus::Running,
                TestStatus::Success,
                TestStatus::Failed,
                TestStatus::Error,
                TestStatus::Other("cancelled".into()),
            ]
        );
        assert_eq!(
            serde_json::to_string(&TestStatus::Other("cancelled".into())).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TestStatus::Success.is_terminal());
        assert!(TestStatus::Failed.is_terminal());
        assert!(TestStatus::Error.is_terminal());
        assert!(!TestStatus::Running.is_terminal());
        assert!(!TestStatus::Queued.is_terminal());
        assert!(!TestStatus::Other("failure".into()).is_terminal());
    }

    #[test]
    fn test_batch_terminal_needs_status_and_full_range() {
        let mut batch = LogBatch {
            logs: vec![],
            start: 3,
            end: 2,
            logs_count: 3,
            status_string: Some(TestStatus::Success),
            done: None,
        };
        assert!(batch.is_terminal());

        batch.status_string = Some(TestStatus::Running);
        assert!(!batch.is_terminal());

        batch.status_string = Some(TestStatus::Failed);
        batch.logs_count = 5;
        assert!(!batch.is_terminal());

        batch.status_string = None;
        batch.logs_count = 3;
        assert!(!batch.is_terminal());
    }

    #[test]
    fn test_batch_decodes_sparse_payloads() {
        let batch: LogBatch =
            serde_json::from_str(r#"{"logs": ["a", null, "c"], "done": null}"#).unwrap();
        assert_eq!(batch.logs, vec!["a", "", "c"]);
        assert!(!batch.is_done());
        assert_eq!(batch.status_string, None);

        let batch: LogBatch = serde_json::from_str(r#"{"logs": null, "done": true}"#).unwrap();
        assert!(batch.logs.is_empty());
        assert!(batch.is_done());
    }

    #[test]
    fn test_dialect_offset_params() {
        assert_eq!(Dialect::Status.offset_param(), "start");
        assert_eq!(Dialect::DoneFlag.offset_param(), "from");
        assert_eq!("done-flag".parse::<Dialect>(), Ok(Dialect::DoneFlag));
        assert!("other".parse::<Dialect>().is_err());
    }
}
