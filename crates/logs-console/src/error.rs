/// Failure to retrieve a log batch.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("Log endpoint unavailable: {0}")]
    Unavailable(String),
}

/// Failure to start the feed server.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Failed to bind feed server to {addr}: {reason}")]
    Bind { addr: String, reason: String },
}
