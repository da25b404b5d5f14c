use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{LogBatch, TestStatus};

/// Listing entry of a feed served over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSummary {
    pub id: String,
    pub status_string: TestStatus,
    pub logs_count: usize,
}

#[derive(Debug, Default)]
struct FeedState {
    lines: Vec<String>,
    status: TestStatus,
    done: bool,
}

/// Growing log of one test run. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct LogFeed {
    state: Arc<RwLock<FeedState>>,
}

impl LogFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, FeedState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FeedState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a line and moves a queued feed to `running`.
    pub fn push(&self, line: impl Into<String>) {
        self.extend([line]);
    }

    pub fn extend<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.write();
        state.lines.extend(lines.into_iter().map(Into::into));
        if state.status == TestStatus::Queued {
            state.status = TestStatus::Running;
        }
    }

    pub fn set_status(&self, status: TestStatus) {
        self.write().status = status;
    }

    /// Sets the final status and raises the completion flag.
    pub fn finish(&self, status: TestStatus) {
        let mut state = self.write();
        state.status = status;
        state.done = true;
    }

    pub fn status(&self) -> TestStatus {
        self.read().status.clone()
    }

    pub fn len(&self) -> usize {
        self.read().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().lines.is_empty()
    }

    pub fn is_done(&self) -> bool {
        self.read().done
    }

    /// Lines from `start` on, at most `limit` of them.
    ///
    /// `start` past the end yields an empty batch whose `end` is the index of
    /// the last known line, so a finished feed reads as a complete range.
    pub fn slice(&self, start: usize, limit: Option<usize>) -> LogBatch {
        let state = self.read();
        let total = state.lines.len();
        let start = start.min(total);
        let stop = match limit {
            Some(limit) => start.saturating_add(limit).min(total),
            None => total,
        };
        let logs = state.lines[start..stop].to_vec();

        LogBatch {
            end: stop as i64 - 1,
            logs,
            start,
            logs_count: total,
            status_string: Some(state.status.clone()),
            done: state.done.then_some(serde_json::Value::Bool(true)),
        }
    }

    pub fn summary(&self, id: &str) -> FeedSummary {
        let state = self.read();
        FeedSummary {
            id: id.to_string(),
            status_string: state.status.clone(),
            logs_count: state.lines.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_with(lines: &[&str]) -> LogFeed {
        let feed = LogFeed::new();
        feed.extend(lines.iter().copied());
        feed
    }

    #[test]
    fn test_push_starts_running() {
        let feed = LogFeed::new();
        assert_eq!(feed.status(), TestStatus::Queued);
        feed.push(">>> Starting tests !");
        assert_eq!(feed.status(), TestStatus::Running);
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_slice_from_offset() {
        let feed = feed_with(&["a", "b", "c", "d"]);
        let batch = feed.slice(1, None);
        assert_eq!(batch.logs, vec!["b", "c", "d"]);
        assert_eq!(batch.start, 1);
        assert_eq!(batch.end, 3);
        assert_eq!(batch.logs_count, 4);
        assert!(batch.is_complete_range());
    }

    #[test]
    fn test_slice_with_limit_is_partial() {
        let feed = feed_with(&["a", "b", "c", "d"]);
        feed.finish(TestStatus::Success);

        let first = feed.slice(0, Some(2));
        assert_eq!(first.logs, vec!["a", "b"]);
        assert_eq!(first.end, 1);
        assert!(!first.is_terminal());

        let rest = feed.slice(2, Some(2));
        assert_eq!(rest.logs, vec!["c", "d"]);
        assert!(rest.is_terminal());
    }

    #[test]
    fn test_slice_past_end_reports_full_range() {
        let feed = feed_with(&["a", "b", "c"]);
        feed.set_status(TestStatus::Success);

        let batch = feed.slice(10, None);
        assert!(batch.logs.is_empty());
        assert_eq!(batch.start, 3);
        assert_eq!(batch.end, 2);
        assert!(batch.is_terminal());
    }

    #[test]
    fn test_empty_finished_feed_is_terminal() {
        let feed = LogFeed::new();
        feed.finish(TestStatus::Error);
        let batch = feed.slice(0, None);
        assert_eq!(batch.end, -1);
        assert!(batch.is_terminal());
        assert!(batch.is_done());
    }

    #[test]
    fn test_done_flag_only_after_finish() {
        let feed = feed_with(&["a"]);
        assert_eq!(feed.slice(0, None).done, None);
        feed.finish(TestStatus::Failed);
        assert!(feed.is_done());
        assert_eq!(
            feed.slice(0, None).done,
            Some(serde_json::Value::Bool(true))
        );
    }

    #[test]
    fn test_clones_share_state() {
        let feed = LogFeed::new();
        let writer = feed.clone();
        writer.push("line");
        assert_eq!(feed.summary("run-1"), FeedSummary {
            id: "run-1".into(),
            status_string: TestStatus::Running,
            logs_count: 1,
        });
    }
}
