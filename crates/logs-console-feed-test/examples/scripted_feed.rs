use logs_console::{get_feed_port, FeedServer, TestStatus};
use std::thread;
use std::time::Duration;

fn main() {
    let addr = format!("127.0.0.1:{}", get_feed_port());
    let server = FeedServer::bind(&addr).expect("Failed to bind feed server");
    let _server_thread = server.spawn().expect("Failed to spawn feed server");

    let feed = server.feed("demo");
    println!("Serving {}", server.feed_url("demo"));
    println!("   Run: cargo run -p logs-console --features tui -- console {}\n", server.feed_url("demo"));

    feed.extend([">>> Starting tests !", ">>>> Testing data/tlg0001/__cts__.xml"]);
    thread::sleep(Duration::from_secs(1));

    feed.push(">>>>> Namespace : passed");
    thread::sleep(Duration::from_secs(1));

    feed.push(">>>>>> DTD : missing >>>>>> Schema : invalid");
    feed.push("[failure]1 over 2 texts have fully passed the tests");
    feed.finish(TestStatus::Failed);
    println!("Feed finished");

    thread::sleep(Duration::from_secs(15));
    server.shutdown();
    println!("\nScripted feed example completed!");
}
