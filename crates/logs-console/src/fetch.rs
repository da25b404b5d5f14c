use crate::{Dialect, LogBatch, PollError, PollerConfig};
use std::time::Duration;

/// One log request. The poller fills it from its `PollerConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub dialect: Dialect,
    /// Number of lines already rendered.
    pub offset: usize,
    /// Page size, the whole remaining log when `None`.
    pub limit: Option<usize>,
}

/// Source of log batches, addressed by the number of lines already rendered.
pub trait FetchLogs: Send + Sync {
    fn fetch(&self, request: FetchRequest) -> Result<LogBatch, PollError>;
}

impl<F: FetchLogs + ?Sized> FetchLogs for std::sync::Arc<F> {
    fn fetch(&self, request: FetchRequest) -> Result<LogBatch, PollError> {
        (**self).fetch(request)
    }
}

/// Fetches log batches from an HTTP endpoint.
pub struct HttpFetcher {
    agent: ureq::Agent,
    url: String,
}

impl HttpFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            url: url.into(),
        }
    }

    /// Fetcher using the request timeout of `config`.
    pub fn from_config(url: impl Into<String>, config: &PollerConfig) -> Self {
        Self::new(url, config.timeout)
    }
}

impl FetchLogs for HttpFetcher {
    fn fetch(&self, request: FetchRequest) -> Result<LogBatch, PollError> {
        let mut call = self
            .agent
            .get(&self.url)
            .query(request.dialect.offset_param(), request.offset.to_string());
        if let Some(limit) = request.limit {
            call = call.query("limit", limit.to_string());
        }
        let batch: LogBatch = call.call()?.body_mut().read_json()?;
        Ok(batch)
    }
}
