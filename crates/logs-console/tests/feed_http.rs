use crossbeam_channel::unbounded;
use logs_console::{
    spawn, Dialect, FeedServer, FeedSummary, FetchLogs, FetchRequest, HttpFetcher, PollError,
    PollEvent, Poller, PollerConfig, RenderTarget, SessionEnd, TestStatus, Toggle,
};
use std::sync::Arc;
use std::time::Duration;

fn start_server() -> FeedServer {
    let server = FeedServer::bind("127.0.0.1:0").expect("Failed to bind feed server");
    server.spawn().expect("Failed to spawn feed server");
    server
}

fn fetcher(server: &FeedServer, id: &str) -> HttpFetcher {
    HttpFetcher::new(server.feed_url(id), Duration::from_secs(2))
}

#[test]
fn test_session_follows_growing_feed() {
    let server = start_server();
    let feed = server.feed("run-1");
    feed.extend([">>> Starting tests !", ">>>> Testing data/a.xml"]);

    let poller = Arc::new(Poller::new(
        fetcher(&server, "run-1"),
        PollerConfig::default().interval(Duration::from_millis(50)),
        RenderTarget::shared(),
    ));
    let (events_tx, events_rx) = unbounded();
    let handle = spawn(Arc::clone(&poller), Some(events_tx)).expect("Failed to spawn poller");

    let mut pushed_third = false;
    let mut finished = None;
    while finished.is_none() {
        let event = events_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("Timed out waiting for poll events");
        let rendered = poller.target().read().unwrap().len();
        match event {
            PollEvent::Appended { .. } if rendered == 2 && !pushed_third => {
                feed.push(">>>>> a.xml passed");
                pushed_third = true;
            }
            PollEvent::Appended { .. } if rendered == 3 && feed.status() == TestStatus::Running => {
                feed.set_status(TestStatus::Success);
            }
            PollEvent::Finished(end) => finished = Some(end),
            _ => {}
        }
    }

    assert_eq!(
        finished,
        Some(SessionEnd::Terminated(Some(TestStatus::Success)))
    );
    assert_eq!(handle.join(), SessionEnd::Terminated(Some(TestStatus::Success)));

    let target = poller.target();
    let target = target.read().unwrap();
    assert_eq!(target.len(), 3);
    assert_eq!(
        target.items_html(0),
        "<li><u>Starting tests !</u></li>\
         <li><b>Testing data/a.xml</b></li>\
         <li><i>a.xml passed</i></li>"
    );

    server.shutdown();
}

#[test]
fn test_paged_session_requests_every_page() {
    let server = start_server();
    let feed = server.feed("paged");
    feed.extend(["1", "2", "3", "4", "5"]);
    feed.set_status(TestStatus::Failed);

    let poller = Poller::new(
        fetcher(&server, "paged"),
        PollerConfig::default()
            .interval(Duration::from_millis(10))
            .limit(Some(2)),
        RenderTarget::shared(),
    );
    let (_cancel_tx, cancel_rx) = unbounded();

    let end = poller.run(&cancel_rx, None);

    assert_eq!(end, SessionEnd::Terminated(Some(TestStatus::Failed)));
    assert_eq!(poller.target().read().unwrap().len(), 5);
    server.shutdown();
}

#[test]
fn test_start_or_toggle_over_http() {
    let server = start_server();
    server.feed("toggle").extend(["[success]one", "[failure]two"]);

    let poller = Poller::new(
        fetcher(&server, "toggle"),
        PollerConfig::default(),
        RenderTarget::shared(),
    );

    assert_eq!(poller.start_or_toggle().unwrap(), Toggle::Loaded(2));
    assert_eq!(
        poller.target().read().unwrap().to_html(),
        "<ol class=\"logs\"><li><span class='success'>one</span></li>\
         <li><span class='failure'>two</span></li></ol>"
    );

    server.feed("toggle").push("three");
    assert_eq!(poller.start_or_toggle().unwrap(), Toggle::Hidden);
    assert_eq!(poller.target().read().unwrap().len(), 2);
    server.shutdown();
}

#[test]
fn test_done_flag_dialect_uses_from_param() {
    let server = start_server();
    let feed = server.feed("legacy");
    feed.extend(["a", "b", "c"]);

    let fetcher = fetcher(&server, "legacy");
    let batch = fetcher
        .fetch(FetchRequest {
            dialect: Dialect::DoneFlag,
            offset: 1,
            limit: None,
        })
        .unwrap();
    assert_eq!(batch.logs, vec!["b", "c"]);
    assert_eq!(batch.start, 1);
    assert!(!batch.is_done());

    feed.finish(TestStatus::Success);
    let poller = Poller::new(
        fetcher,
        PollerConfig::default()
            .interval(Duration::from_millis(10))
            .dialect(Dialect::DoneFlag),
        RenderTarget::shared(),
    );
    poller.target().write().unwrap().append(["a"]);
    let (_cancel_tx, cancel_rx) = unbounded();

    assert_eq!(poller.run(&cancel_rx, None), SessionEnd::Completed);
    assert_eq!(poller.target().read().unwrap().len(), 3);
    server.shutdown();
}

#[test]
fn test_done_flag_paged_session_reloads_every_line() {
    let server = start_server();
    let feed = server.feed("legacy-paged");
    feed.extend(["1", "2", "3", "4", "5"]);
    feed.finish(TestStatus::Success);

    let poller = Poller::new(
        fetcher(&server, "legacy-paged"),
        PollerConfig::default()
            .interval(Duration::from_millis(10))
            .dialect(Dialect::DoneFlag)
            .limit(Some(2)),
        RenderTarget::shared(),
    );
    let (_cancel_tx, cancel_rx) = unbounded();

    assert_eq!(poller.run(&cancel_rx, None), SessionEnd::Completed);
    let target = poller.target();
    let target = target.read().unwrap();
    assert_eq!(target.len(), 5);
    assert_eq!(
        target.items_html(0),
        "<li>1</li><li>2</li><li>3</li><li>4</li><li>5</li>"
    );
    server.shutdown();
}

#[test]
fn test_unknown_feed_is_an_http_error() {
    let server = start_server();
    let err = fetcher(&server, "missing")
        .fetch(FetchRequest {
            dialect: Dialect::Status,
            offset: 0,
            limit: None,
        })
        .unwrap_err();
    assert!(matches!(err, PollError::Http(_)), "got {err:?}");
    server.shutdown();
}

#[test]
fn test_feed_listing_and_bad_queries() {
    let server = start_server();
    server.feed("b").push("x");
    server.feed("a");

    let feeds: Vec<FeedSummary> = ureq::get(&format!("{}/feeds", server.url()))
        .call()
        .expect("Failed to call /feeds")
        .body_mut()
        .read_json()
        .expect("Failed to parse /feeds");
    let ids: Vec<&str> = feeds.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
    assert_eq!(feeds[1].logs_count, 1);
    assert_eq!(feeds[1].status_string, TestStatus::Running);

    let bad = ureq::get(&format!("{}?start=abc", server.feed_url("b"))).call();
    assert!(matches!(bad, Err(ureq::Error::StatusCode(400))));

    let missing = ureq::get(&format!("{}/nope", server.url())).call();
    assert!(matches!(missing, Err(ureq::Error::StatusCode(404))));
    server.shutdown();
}
