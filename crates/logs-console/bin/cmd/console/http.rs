use eyre::Result;
use logs_console::FeedSummary;

/// Fetches the feed listing of a log feed server
pub(crate) fn fetch_feeds(agent: &ureq::Agent, server_url: &str) -> Result<Vec<FeedSummary>> {
    let url = format!("{}/feeds", server_url.trim_end_matches('/'));
    let feeds: Vec<FeedSummary> = agent.get(&url).call()?.body_mut().read_json()?;
    Ok(feeds)
}

/// Log endpoint of the feed `id` on `server_url`
pub(crate) fn feed_logs_url(server_url: &str, id: &str) -> String {
    format!("{}/feeds/{}/logs", server_url.trim_end_matches('/'), id)
}
