#[cfg(test)]
pub mod tests {
    use logs_console::{
        spawn, HttpFetcher, LogBatch, PollEvent, Poller, PollerConfig, RenderTarget,
        SessionEnd, TestStatus,
    };
    use std::process::Command;
    use std::sync::Arc;
    use std::{thread::sleep, time::Duration};

    const PORT: &str = "6791";

    #[test]
    fn test_scripted_feed_session() {
        // Spawn example process
        let mut child = Command::new("cargo")
            .args([
                "run",
                "-p",
                "logs-console-feed-test",
                "--example",
                "scripted_feed",
            ])
            .env("LOGS_CONSOLE_PORT", PORT)
            .spawn()
            .expect("Failed to spawn command");

        let url = format!("http://127.0.0.1:{}/feeds/demo/logs", PORT);
        let mut first_batch = None;
        let mut last_error = None;

        // Wait for the feed to come up
        for _attempt in 0..120 {
            sleep(Duration::from_millis(500));

            match ureq::get(&url).call() {
                Ok(mut response) => {
                    first_batch = Some(
                        response
                            .body_mut()
                            .read_json::<LogBatch>()
                            .expect("Failed to parse log batch"),
                    );
                    last_error = None;
                    break;
                }
                Err(e) => {
                    last_error = Some(format!("Request error: {}", e));
                }
            }
        }

        if let Some(error) = last_error {
            let _ = child.kill();
            panic!("Feed never came up: {}", error);
        }

        let first_batch = first_batch.expect("No batch received");
        assert!(
            first_batch.logs.contains(&">>> Starting tests !".to_string()),
            "Got: {:?}",
            first_batch.logs
        );

        let poller = Arc::new(Poller::new(
            HttpFetcher::new(&url, Duration::from_secs(2)),
            PollerConfig::default().interval(Duration::from_millis(300)),
            RenderTarget::shared(),
        ));
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let handle = spawn(Arc::clone(&poller), Some(events_tx)).expect("Failed to spawn poller");

        let mut end = None;
        while let Ok(event) = events_rx.recv_timeout(Duration::from_secs(10)) {
            if let PollEvent::Finished(session_end) = event {
                end = Some(session_end);
                break;
            }
        }
        handle.cancel();

        let _ = child.kill();
        let _ = child.wait();

        assert_eq!(end, Some(SessionEnd::Terminated(Some(TestStatus::Failed))));

        let html = poller.target().read().unwrap().to_html();
        let all_expected = [
            "<li><u>Starting tests !</u></li>",
            "<li><i>Namespace : passed</i></li>",
            "<li><ol class=\"verbose\"><li><span class='verbose'>DTD : missing</span></li>",
            "<span class='failure'>1 over 2 texts have fully passed the tests</span>",
        ];
        for expected in all_expected {
            assert!(
                html.contains(expected),
                "Expected:\n{expected}\n\nGot:\n{html}",
            );
        }
        assert_eq!(poller.target().read().unwrap().len(), 5);
    }
}
