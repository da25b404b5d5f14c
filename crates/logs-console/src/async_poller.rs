//! Session loop on a tokio task.
//!
//! Fetches stay blocking and run on the blocking pool; the interval is a
//! `tokio::time::sleep` raced against the cancel signal.

use crossbeam_channel::Sender;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::fetch::FetchLogs;
use crate::poller::{PollEvent, PollState, Poller, SessionEnd, Step};

/// Handle of a session running on a tokio task. Dropping it cancels the
/// session.
pub struct AsyncPollHandle {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<SessionEnd>>,
}

impl AsyncPollHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    /// Waits for the session to end.
    pub async fn join(mut self) -> SessionEnd {
        match self.task.take() {
            Some(task) => task.await.unwrap_or(SessionEnd::Cancelled),
            None => SessionEnd::Cancelled,
        }
    }
}

/// Runs `poller` on the current tokio runtime.
pub fn spawn_async<F>(poller: Arc<Poller<F>>, events: Option<Sender<PollEvent>>) -> AsyncPollHandle
where
    F: FetchLogs + 'static,
{
    let (cancel_tx, mut cancel_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let interval = poller.config().interval;
        let mut step = Step::Poll;

        let end = loop {
            step = match step {
                Step::Wait(next) => {
                    poller.set_state(PollState::Scheduled);
                    tokio::select! {
                        _ = cancel_rx.changed() => break SessionEnd::Cancelled,
                        _ = tokio::time::sleep(interval) => *next,
                    }
                }
                Step::Finish(end) => break end,
                step => {
                    let worker = Arc::clone(&poller);
                    let tx = events.clone();
                    match tokio::task::spawn_blocking(move || worker.advance(step, tx.as_ref()))
                        .await
                    {
                        Ok(next) => next,
                        Err(e) => {
                            warn!(error = %e, "poll task failed");
                            break SessionEnd::Cancelled;
                        }
                    }
                }
            };
        };

        poller.finish(end, events.as_ref())
    });

    AsyncPollHandle {
        cancel: cancel_tx,
        task: Some(task),
    }
}

impl Drop for AsyncPollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::tests::{batch, ScriptedFetcher};
    use crate::{PollerConfig, RenderTarget, TestStatus};
    use std::time::Duration;

    #[tokio::test]
    async fn test_async_session_runs_to_terminal_status() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(batch(&["a", "b"], 0, 2, "running")),
            Ok(batch(&["c"], 2, 3, "running")),
            Ok(batch(&[], 3, 3, "success")),
        ]);
        let poller = Arc::new(Poller::new(
            fetcher,
            PollerConfig::default().interval(Duration::from_millis(10)),
            RenderTarget::shared(),
        ));

        let handle = spawn_async(Arc::clone(&poller), None);
        let end = handle.join().await;

        assert_eq!(end, SessionEnd::Terminated(Some(TestStatus::Success)));
        assert_eq!(poller.target().read().unwrap().len(), 3);
        assert_eq!(poller.state(), PollState::Terminated);
    }

    #[tokio::test]
    async fn test_async_cancel_interrupts_wait() {
        let fetcher =
            ScriptedFetcher::new(vec![]).then_forever(batch(&[], 0, 0, "running"));
        let poller = Arc::new(Poller::new(
            fetcher,
            PollerConfig::default().interval(Duration::from_secs(60)),
            RenderTarget::shared(),
        ));
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let handle = spawn_async(Arc::clone(&poller), Some(events_tx));
        for _ in 0..500 {
            if poller.state() == PollState::Scheduled {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.cancel();

        assert_eq!(handle.join().await, SessionEnd::Cancelled);
        assert_eq!(
            events_rx.try_iter().last(),
            Some(PollEvent::Finished(SessionEnd::Cancelled))
        );
    }
}
