use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use std::thread::JoinHandle;
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, error, info};

use crate::feed::{FeedSummary, LogFeed};
use crate::ServeError;

static RE_FEED_LOGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/feeds/([A-Za-z0-9_.\-]+)/logs$").unwrap());

type Feeds = Arc<RwLock<BTreeMap<String, LogFeed>>>;

/// HTTP server publishing log feeds as `LogBatch` JSON.
///
/// Routes:
/// - `GET /feeds` lists every feed
/// - `GET /feeds/<id>/logs?start=N&limit=M` returns lines from `N` on
///   (`from` is accepted in place of `start`)
pub struct FeedServer {
    server: Arc<Server>,
    feeds: Feeds,
}

impl FeedServer {
    pub fn bind(addr: &str) -> Result<Self, ServeError> {
        let server = Server::http(addr).map_err(|e| ServeError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        let server = Self {
            server: Arc::new(server),
            feeds: Arc::new(RwLock::new(BTreeMap::new())),
        };
        info!(url = %server.url(), "log feed server bound");
        Ok(server)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Base URL, e.g. `http://127.0.0.1:6780`.
    pub fn url(&self) -> String {
        match self.local_addr() {
            Some(addr) => format!("http://{}", addr),
            None => String::from("http://127.0.0.1"),
        }
    }

    pub fn feed_url(&self, id: &str) -> String {
        format!("{}/feeds/{}/logs", self.url(), id)
    }

    /// Returns the feed registered under `id`, creating it if needed.
    pub fn feed(&self, id: &str) -> LogFeed {
        let mut feeds = self.feeds.write().unwrap_or_else(PoisonError::into_inner);
        feeds.entry(id.to_string()).or_default().clone()
    }

    /// Serves requests on a background thread until `shutdown`.
    pub fn spawn(&self) -> std::io::Result<JoinHandle<()>> {
        let server = Arc::clone(&self.server);
        let feeds = Arc::clone(&self.feeds);
        std::thread::Builder::new()
            .name("log-feed-server".into())
            .spawn(move || {
                for request in server.incoming_requests() {
                    handle_request(request, &feeds);
                }
            })
    }

    pub fn shutdown(&self) {
        self.server.unblock();
    }
}

fn handle_request(request: Request, feeds: &Feeds) {
    let url = request.url().to_string();
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
    debug!(path, query, "feed request");

    if path == "/feeds" {
        let summaries: Vec<FeedSummary> = feeds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, feed)| feed.summary(id))
            .collect();
        return respond_json(request, &summaries);
    }

    // Handle /feeds/<id>/logs
    if let Some(caps) = RE_FEED_LOGS.captures(path) {
        let params = parse_query(query);
        let start = match param(&params, &["start", "from"]) {
            Ok(start) => start.unwrap_or(0),
            Err(msg) => return respond_error(request, 400, &msg),
        };
        let limit = match param(&params, &["limit"]) {
            Ok(limit) => limit,
            Err(msg) => return respond_error(request, 400, &msg),
        };

        let feed = feeds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&caps[1])
            .cloned();
        return match feed {
            Some(feed) => respond_json(request, &feed.slice(start, limit)),
            None => respond_error(request, 404, "Feed not found"),
        };
    }

    respond_error(request, 404, "Not found");
}

fn parse_query(query: &str) -> HashMap<&str, &str> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect()
}

/// First of `names` present in the query, parsed as a line count.
fn param(params: &HashMap<&str, &str>, names: &[&str]) -> Result<Option<usize>, String> {
    let Some((name, value)) = names
        .iter()
        .find_map(|name| params.get(name).map(|value| (name, value)))
    else {
        return Ok(None);
    };
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|_| format!("Invalid {}: {}", name, value))
}

fn respond_json<T: Serialize>(request: Request, value: &T) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::from_data(body);
            if let Ok(header) =
                Header::from_bytes(b"Content-Type".as_slice(), b"application/json".as_slice())
            {
                response.add_header(header);
            }
            let _ = request.respond(response);
        }
        Err(e) => respond_internal_error(request, e),
    }
}

fn respond_error(request: Request, code: u16, msg: &str) {
    let _ = request.respond(Response::from_string(msg).with_status_code(code));
}

fn respond_internal_error(request: Request, e: impl Display) {
    error!(error = %e, "internal server error");
    let _ = request.respond(
        Response::from_string(format!("Internal server error: {}", e)).with_status_code(500),
    );
}
