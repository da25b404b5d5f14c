use crossbeam_channel::{after, unbounded, Receiver, Sender};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::fetch::{FetchLogs, FetchRequest};
use crate::target::{RenderTarget, SharedTarget};
use crate::{get_poll_interval, Dialect, LogBatch, PollError, TestStatus, DEFAULT_POLL_INTERVAL};

/// Settings of a polling session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Fixed delay between two polls.
    pub interval: Duration,
    pub dialect: Dialect,
    /// Page size sent as `limit`, unbounded when `None`.
    pub limit: Option<usize>,
    /// Overall timeout of one HTTP request.
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            dialect: Dialect::default(),
            limit: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl PollerConfig {
    /// Defaults with the interval taken from `LOGS_CONSOLE_POLL_INTERVAL`.
    pub fn from_env() -> Self {
        Self {
            interval: get_poll_interval(),
            ..Default::default()
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of `Poller::start_or_toggle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The target was empty; this many lines were fetched and rendered.
    Loaded(usize),
    Shown,
    Hidden,
}

/// Why the incremental state was thrown away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncReason {
    /// The server set its completion flag.
    Completed,
    /// The poll request failed.
    Transport(String),
}

/// Result of a single `Poller::reload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// New lines were appended and another poll is due after the interval.
    Scheduled {
        appended: usize,
        status: Option<TestStatus>,
    },
    /// New lines were appended and the server reported a terminal state.
    Terminated {
        appended: usize,
        status: Option<TestStatus>,
    },
    /// The target has to be rebuilt from scratch.
    Resync(ResyncReason),
}

/// Lifecycle of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Idle,
    Fetching,
    Scheduled,
    Terminated,
}

impl PollState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Idle => "idle",
            PollState::Fetching => "fetching",
            PollState::Scheduled => "scheduled",
            PollState::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a session loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Terminal status reached with every line rendered.
    Terminated(Option<TestStatus>),
    /// Completion flag seen; the target was reloaded in full.
    Completed,
    Cancelled,
}

/// Progress notifications of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// Raw lines appended at `offset` by one poll.
    Appended {
        offset: usize,
        lines: Vec<String>,
        status: Option<TestStatus>,
    },
    Resynced {
        reason: ResyncReason,
        lines: usize,
    },
    ResyncFailed(String),
    Finished(SessionEnd),
}

/// Drives incremental retrieval of one log endpoint into one render target.
pub struct Poller<F> {
    fetcher: F,
    config: PollerConfig,
    target: SharedTarget,
    state: Arc<RwLock<PollState>>,
}

impl<F: FetchLogs> Poller<F> {
    pub fn new(fetcher: F, config: PollerConfig, target: SharedTarget) -> Self {
        Self {
            fetcher,
            config,
            target,
            state: Arc::new(RwLock::new(PollState::Idle)),
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn target(&self) -> SharedTarget {
        Arc::clone(&self.target)
    }

    pub fn state(&self) -> PollState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: PollState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn read_target(&self) -> RwLockReadGuard<'_, RenderTarget> {
        self.target.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_target(&self) -> RwLockWriteGuard<'_, RenderTarget> {
        self.target.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn request(&self, offset: usize, limit: Option<usize>) -> FetchRequest {
        FetchRequest {
            dialect: self.config.dialect,
            offset,
            limit,
        }
    }

    /// Raw text of `count` rendered lines starting at `offset`.
    fn raw_lines(&self, offset: usize, count: usize) -> Vec<String> {
        self.read_target()
            .lines()
            .iter()
            .skip(offset)
            .take(count)
            .map(|line| line.raw.clone())
            .collect()
    }

    /// Loads the full log into an empty target, or flips the visibility of a
    /// target that already holds lines without fetching anything.
    pub fn start_or_toggle(&self) -> Result<Toggle, PollError> {
        {
            let mut target = self.write_target();
            if !target.is_empty() {
                return Ok(if target.toggle() {
                    Toggle::Shown
                } else {
                    Toggle::Hidden
                });
            }
        }

        let batch = self.fetcher.fetch(self.request(0, None))?;
        let mut target = self.write_target();
        let loaded = target.append(batch.logs);
        target.attach();
        debug!(loaded, "loaded full log");
        Ok(Toggle::Loaded(loaded))
    }

    /// Fetches the lines past the ones already rendered and appends them.
    pub fn reload(&self) -> PollOutcome {
        let offset = self.read_target().len();

        let batch = match self.fetcher.fetch(self.request(offset, self.config.limit)) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(offset, error = %e, "poll failed");
                return PollOutcome::Resync(ResyncReason::Transport(e.to_string()));
            }
        };

        if self.config.dialect == Dialect::DoneFlag && batch.is_done() {
            debug!(offset, "completion flag set");
            return PollOutcome::Resync(ResyncReason::Completed);
        }

        let terminal = self.config.dialect == Dialect::Status && batch.is_terminal();
        let status = batch.status_string.clone();
        let appended = self.write_target().append(batch.logs);
        debug!(
            offset,
            appended,
            status = status.as_ref().map(TestStatus::as_str),
            terminal,
            "polled"
        );

        if terminal {
            PollOutcome::Terminated { appended, status }
        } else {
            PollOutcome::Scheduled { appended, status }
        }
    }

    /// Replaces the target with a fresh one holding the full log. The page
    /// size does not apply here.
    fn full_reload(&self) -> Result<LogBatch, PollError> {
        let mut batch = self.fetcher.fetch(self.request(0, None))?;
        let mut fresh = RenderTarget::new();
        fresh.append(std::mem::take(&mut batch.logs));
        fresh.attach();
        *self.write_target() = fresh;
        Ok(batch)
    }

    /// How a full reload ends the session, if it does.
    fn finished_by(&self, batch: &LogBatch) -> Option<SessionEnd> {
        match self.config.dialect {
            Dialect::Status if batch.is_terminal() => {
                Some(SessionEnd::Terminated(batch.status_string.clone()))
            }
            Dialect::DoneFlag if batch.is_done() => Some(SessionEnd::Completed),
            _ => None,
        }
    }

    /// Performs one blocking step of the session and returns the next one.
    ///
    /// Only `Step::Poll` and `Step::Reload` do work; drivers handle
    /// `Step::Wait` and `Step::Finish` themselves.
    pub(crate) fn advance(&self, step: Step, events: Option<&Sender<PollEvent>>) -> Step {
        let emit = |event: PollEvent| {
            if let Some(tx) = events {
                let _ = tx.send(event);
            }
        };
        self.set_state(PollState::Fetching);

        match step {
            Step::Poll => {
                let offset = self.read_target().len();
                match self.reload() {
                    PollOutcome::Scheduled { appended, status } => {
                        emit(PollEvent::Appended {
                            offset,
                            lines: self.raw_lines(offset, appended),
                            status,
                        });
                        Step::Wait(Box::new(Step::Poll))
                    }
                    PollOutcome::Terminated { appended, status } => {
                        emit(PollEvent::Appended {
                            offset,
                            lines: self.raw_lines(offset, appended),
                            status: status.clone(),
                        });
                        Step::Finish(SessionEnd::Terminated(status))
                    }
                    PollOutcome::Resync(reason) => Step::Reload(reason),
                }
            }
            Step::Reload(reason) => match self.full_reload() {
                Ok(batch) => {
                    let lines = self.read_target().len();
                    info!(lines, ?reason, "resynced");
                    emit(PollEvent::Resynced {
                        reason: reason.clone(),
                        lines,
                    });
                    if reason == ResyncReason::Completed {
                        return Step::Finish(SessionEnd::Completed);
                    }
                    match self.finished_by(&batch) {
                        Some(end) => Step::Finish(end),
                        None => Step::Wait(Box::new(Step::Poll)),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "full reload failed");
                    emit(PollEvent::ResyncFailed(e.to_string()));
                    Step::Wait(Box::new(Step::Reload(reason)))
                }
            },
            other => other,
        }
    }

    /// Marks the session over and reports how it ended.
    pub(crate) fn finish(&self, end: SessionEnd, events: Option<&Sender<PollEvent>>) -> SessionEnd {
        self.set_state(PollState::Terminated);
        if let Some(tx) = events {
            let _ = tx.send(PollEvent::Finished(end.clone()));
        }
        end
    }

    /// Waits one interval. Returns `true` when the session got cancelled.
    fn wait(&self, cancel: &Receiver<()>) -> bool {
        self.set_state(PollState::Scheduled);
        crossbeam_channel::select! {
            recv(cancel) -> _ => true,
            recv(after(self.config.interval)) -> _ => false,
        }
    }

    /// Polls until a terminal condition or cancellation.
    ///
    /// A message on `cancel`, or dropping its sender, stops the loop at the
    /// next wait.
    pub fn run(&self, cancel: &Receiver<()>, events: Option<&Sender<PollEvent>>) -> SessionEnd {
        let mut step = Step::Poll;
        let end = loop {
            step = match step {
                Step::Wait(next) => {
                    if self.wait(cancel) {
                        break SessionEnd::Cancelled;
                    }
                    *next
                }
                Step::Finish(end) => break end,
                step => self.advance(step, events),
            };
        };
        self.finish(end, events)
    }
}

/// Position of a session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Fetch the lines past the rendered ones.
    Poll,
    /// Rebuild the target from a full fetch.
    Reload(ResyncReason),
    /// Sleep one interval, then continue with the boxed step.
    Wait(Box<Step>),
    Finish(SessionEnd),
}

/// Handle of a session running on its own thread. Dropping it cancels the
/// session.
pub struct PollHandle {
    cancel: Sender<()>,
    state: Arc<RwLock<PollState>>,
    thread: Option<JoinHandle<SessionEnd>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(());
    }

    pub fn state(&self) -> PollState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    /// Waits for the session to end.
    pub fn join(mut self) -> SessionEnd {
        self.thread
            .take()
            .and_then(|thread| thread.join().ok())
            .unwrap_or(SessionEnd::Cancelled)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs `poller` on a background thread.
pub fn spawn<F>(
    poller: Arc<Poller<F>>,
    events: Option<Sender<PollEvent>>,
) -> std::io::Result<PollHandle>
where
    F: FetchLogs + 'static,
{
    let (cancel_tx, cancel_rx) = unbounded::<()>();
    let state = Arc::clone(&poller.state);

    let thread = std::thread::Builder::new()
        .name("log-poller".into())
        .spawn(move || poller.run(&cancel_rx, events.as_ref()))?;

    Ok(PollHandle {
        cancel: cancel_tx,
        state,
        thread: Some(thread),
    })
}
