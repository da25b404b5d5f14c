use clap::Parser;
use eyre::{eyre, Result, WrapErr};
use logs_console::{get_feed_port, FeedServer, LogFeed, TestStatus};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::{debug, info};

use super::init_tracing;

const FAILURE_MARKER: &str = "[failure]";

#[derive(Debug, Parser)]
pub struct ServeArgs {
    /// File to publish, read from stdin when omitted
    pub file: Option<PathBuf>,

    /// Port of the feed server (defaults to LOGS_CONSOLE_PORT or 6780)
    #[arg(long)]
    pub port: Option<u16>,

    /// Feed id, defaults to the file stem or "stdin"
    #[arg(long)]
    pub id: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl ServeArgs {
    pub fn run(&self) -> Result<()> {
        init_tracing(self.verbose);

        let port = self.port.unwrap_or_else(get_feed_port);
        let server = FeedServer::bind(&format!("127.0.0.1:{}", port))?;
        let id = self.feed_id();
        let feed = server.feed(&id);
        let server_thread = server
            .spawn()
            .wrap_err("Failed to start the feed server thread")?;

        println!("Serving feed at {}", server.feed_url(&id));

        let reader: Box<dyn BufRead> = match &self.file {
            Some(path) => Box::new(BufReader::new(File::open(path).wrap_err_with(|| {
                format!("Failed to open {}", path.display())
            })?)),
            None => Box::new(BufReader::new(io::stdin())),
        };
        let status = publish(reader, &feed)?;

        info!(id = %id, lines = feed.len(), %status, "input finished");
        println!(
            "Feed {} finished ({}, {} lines), press Ctrl-C to stop",
            id,
            status,
            feed.len()
        );

        server_thread
            .join()
            .map_err(|_| eyre!("Feed server thread panicked"))
    }

    fn feed_id(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        self.file
            .as_ref()
            .and_then(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("stdin"))
    }
}

/// Pushes every input line into `feed` and finishes it. The run is `failed`
/// when any line carries the failure marker.
fn publish(reader: impl BufRead, feed: &LogFeed) -> Result<TestStatus> {
    let mut failed = false;
    for line in reader.lines() {
        let line = line.wrap_err("Failed to read input")?;
        debug!(line = %line, "publishing");
        failed |= line.starts_with(FAILURE_MARKER);
        feed.push(line);
    }

    let status = if failed {
        TestStatus::Failed
    } else {
        TestStatus::Success
    };
    feed.finish(status.clone());
    Ok(status)
}
