use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Receiver};
use logs_console::{
    spawn, FeedSummary, HttpFetcher, PollEvent, PollHandle, PollState, Poller, PollerConfig,
    SessionEnd, SharedTarget, TestStatus,
};
use std::io;
use std::sync::Arc;
use tracing::debug;

use crate::cmd::http_poller;

/// Represents which UI component has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Focus {
    Targets,
    Logs,
    Inspect,
}

/// A running (or finished) polling session of one target.
pub(crate) struct Session {
    handle: PollHandle,
    events: Receiver<PollEvent>,
}

/// One log endpoint shown in the targets table.
pub(crate) struct TargetEntry {
    pub(crate) label: String,
    pub(crate) url: String,
    pub(crate) poller: Arc<Poller<HttpFetcher>>,
    pub(crate) session: Option<Session>,
    /// Latest status reported by a poll.
    pub(crate) status: Option<TestStatus>,
    /// Latest entry of the server's `/feeds` listing, when discovered there.
    pub(crate) listed: Option<FeedSummary>,
    pub(crate) last_update: Option<DateTime<Local>>,
    pub(crate) error: Option<String>,
    pub(crate) ended: Option<SessionEnd>,
}

impl TargetEntry {
    pub(crate) fn new(label: impl Into<String>, url: impl Into<String>, config: PollerConfig) -> Self {
        let url = url.into();
        Self {
            label: label.into(),
            poller: http_poller(&url, config),
            url,
            session: None,
            status: None,
            listed: None,
            last_update: None,
            error: None,
            ended: None,
        }
    }

    pub(crate) fn target(&self) -> SharedTarget {
        self.poller.target()
    }

    pub(crate) fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    pub(crate) fn is_polling(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.handle.is_finished())
    }

    /// Starts a session unless one is still running. Returns whether a new
    /// session was started.
    pub(crate) fn start_session(&mut self) -> io::Result<bool> {
        if self.is_polling() {
            return Ok(false);
        }
        self.drain_events();

        let (events_tx, events_rx) = unbounded();
        let handle = spawn(Arc::clone(&self.poller), Some(events_tx))?;
        debug!(url = %self.url, "session started");
        self.session = Some(Session {
            handle,
            events: events_rx,
        });
        self.ended = None;
        Ok(true)
    }

    /// Asks the running session to stop at its next wait.
    pub(crate) fn stop_session(&self) {
        if let Some(session) = &self.session {
            session.handle.cancel();
        }
    }

    /// Applies the progress reported by the session since the last call.
    pub(crate) fn drain_events(&mut self) {
        let events: Vec<PollEvent> = match &self.session {
            Some(session) => session.events.try_iter().collect(),
            None => return,
        };
        for event in events {
            self.record(event);
        }
    }

    fn record(&mut self, event: PollEvent) {
        match event {
            PollEvent::Appended { status, .. } => {
                if status.is_some() {
                    self.status = status;
                }
                self.last_update = Some(Local::now());
                self.error = None;
            }
            PollEvent::Resynced { .. } => {
                self.last_update = Some(Local::now());
                self.error = None;
            }
            PollEvent::ResyncFailed(e) => self.error = Some(e),
            PollEvent::Finished(end) => {
                if let SessionEnd::Terminated(Some(status)) = &end {
                    self.status = Some(status.clone());
                }
                self.ended = Some(end);
            }
        }
    }

    /// Status to display: the polled one, else the listed one.
    pub(crate) fn display_status(&self) -> Option<&TestStatus> {
        self.status
            .as_ref()
            .or(self.listed.as_ref().map(|feed| &feed.status_string))
    }
}
