//! Control surface mapping start / stop / status commands onto the engine
//!
//! The engine itself never rejects a request; the "already running" and
//! "nothing running" conditions are raised here.

use crate::crawler::{CrawlStatus, Engine};
use crate::{ControlError, CrawlError};
use tokio::task::JoinHandle;
use url::Url;

/// Thin command layer over one engine
#[derive(Clone)]
pub struct CrawlController {
    engine: Engine,
}

impl CrawlController {
    /// Wraps an explicitly constructed engine
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// The wrapped engine
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Starts a crawl from `seed` in the background
    ///
    /// # Returns
    ///
    /// * `Ok(JoinHandle)` - Handle of the task running the crawl
    /// * `Err(ControlError::InvalidSeed)` - The seed is not an absolute http(s) URL
    /// * `Err(ControlError::AlreadyRunning)` - The engine is not available
    /// * `Err(ControlError::Unavailable)` - The frontier rejected the seed
    pub fn start(&self, seed: &str) -> Result<JoinHandle<()>, ControlError> {
        let seed = validate_seed(seed)?;

        self.engine
            .spawn_crawl(&seed)
            .map_err(unavailable)?
            .ok_or(ControlError::AlreadyRunning)
    }

    /// Stops the current crawl; always succeeds
    pub async fn stop(&self) {
        self.engine.stop().await;
    }

    /// Returns the crawl snapshot
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlStatus)` - Known and pending addresses
    /// * `Err(ControlError::NothingRunning)` - The engine is idle
    /// * `Err(ControlError::Unavailable)` - The frontier could not be read
    pub fn status(&self) -> Result<CrawlStatus, ControlError> {
        if self.engine.is_available() {
            return Err(ControlError::NothingRunning);
        }

        self.engine.get_status().map_err(unavailable)
    }
}

fn unavailable(e: CrawlError) -> ControlError {
    tracing::error!("Crawler state is unavailable: {}", e);
    ControlError::Unavailable(e.to_string())
}

/// Checks that a seed is an absolute http(s) URL and returns it in canonical form
fn validate_seed(seed: &str) -> Result<String, ControlError> {
    let invalid = |reason: String| ControlError::InvalidSeed {
        url: seed.to_string(),
        reason,
    };

    let url = Url::parse(seed.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url.into()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}
