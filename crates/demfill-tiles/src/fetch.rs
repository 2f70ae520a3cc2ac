//! Per-tile fetching with source fallback and retry.
//!
//! For each tile the sources of a [`SourceList`] are tried in priority order.
//! A source fails for that tile if the request errors, returns a non-success
//! status, returns an empty body, or returns text that does not decode; the
//! next source is then tried. Failures never abort the run: a tile no source
//! can supply is reported as [`TileFetch::NotFound`].

use crate::cancel::CancelToken;
use crate::coord::TileIndex;
use crate::decode::{decode_tile, TileSample};
use crate::source::{SourceList, TileSource};
use crate::transport::TileTransport;
use crate::TileError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Default per-request timeout.
pub const DEFAULT_TILE_TIMEOUT: Duration = Duration::from_secs(10);

/// Retry behaviour for transient request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry (doubles each retry).
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Default delays with `max_retries` retries.
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

/// Result of fetching one tile.
#[derive(Debug, Clone, PartialEq)]
pub enum TileFetch {
    /// A source supplied the tile.
    Found {
        /// Decoded samples.
        sample: TileSample,
        /// Name of the supplying source.
        source: String,
    },
    /// No source could supply the tile.
    NotFound,
}

impl TileFetch {
    /// True if a source supplied the tile.
    pub fn is_found(&self) -> bool {
        matches!(self, TileFetch::Found { .. })
    }

    /// Name of the supplying source.
    pub fn source(&self) -> Option<&str> {
        match self {
            TileFetch::Found { source, .. } => Some(source),
            TileFetch::NotFound => None,
        }
    }
}

/// Fetches and decodes tiles through a [`TileTransport`].
///
/// Cheap to clone and safe to share between worker threads.
#[derive(Clone)]
pub struct TileFetcher {
    transport: Arc<dyn TileTransport>,
    timeout: Duration,
    retry: RetryPolicy,
    cancel: CancelToken,
}

impl TileFetcher {
    /// Create a fetcher with the default timeout and no retries.
    pub fn new(transport: Arc<dyn TileTransport>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TILE_TIMEOUT,
            retry: RetryPolicy::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry policy.
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// The cancellation token workers poll.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fetch `tile`, trying each source in order.
    pub fn fetch(&self, tile: &TileIndex, sources: &SourceList) -> TileFetch {
        for source in sources {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.fetch_from(tile, source) {
                Ok(sample) => {
                    trace!(tile = %tile, source = source.name(), "Tile fetched");
                    return TileFetch::Found {
                        sample,
                        source: source.name().to_string(),
                    };
                }
                Err(e) => {
                    debug!(tile = %tile, source = source.name(), error = %e, "Source has no usable tile");
                }
            }
        }
        TileFetch::NotFound
    }

    /// Fetch `tile` from a single source, retrying transient failures.
    pub fn fetch_from(&self, tile: &TileIndex, source: &TileSource) -> Result<TileSample, TileError> {
        let url = source.url_for(tile);
        let mut attempt = 0;
        let mut delay = self.retry.initial_delay;

        loop {
            match self.request(&url) {
                Err(e)
                    if e.is_transient()
                        && attempt < self.retry.max_retries
                        && !self.cancel.is_cancelled() =>
                {
                    attempt += 1;
                    debug!(
                        url = %url,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Tile request failed, retrying"
                    );
                    if !self.cancel.sleep(delay) {
                        return Err(e);
                    }
                    delay = std::cmp::min(delay * 2, self.retry.max_delay);
                }
                result => return result,
            }
        }
    }

    /// One request, its timeout capped at the time left before the run deadline.
    fn request(&self, url: &str) -> Result<TileSample, TileError> {
        let timeout = match self.cancel.remaining() {
            Some(left) if left.is_zero() => return Err(TileError::Timeout),
            Some(left) => self.timeout.min(left),
            None => self.timeout,
        };
        let response = self.transport.get(url, timeout)?;
        if !response.is_success() {
            return Err(TileError::Status(response.status));
        }
        if response.body.trim().is_empty() {
            return Err(TileError::EmptyBody);
        }
        Ok(decode_tile(&response.body)?)
    }
}

impl std::fmt::Debug for TileFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileFetcher")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
