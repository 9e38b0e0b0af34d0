//! Crawl engine - lifecycle and batch orchestration
//!
//! The engine drives a lock-step batch loop:
//! - Dequeue up to `max_concurrency` pending addresses from the frontier
//! - Crawl them concurrently (fetch, extract links, record new addresses)
//! - Wait for every operation, re-enqueue the ones that failed or were cancelled
//! - Repeat until the frontier runs dry or a stop is requested
//!
//! The next batch never starts before the slowest operation of the current
//! one has finished.

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, FetchOutcome, PageFetcher};
use crate::crawler::parser::extract_links;
use crate::frontier::Frontier;
use crate::state::{ActivityProbe, EngineStatus, Lifecycle, Phase};
use crate::{Address, CrawlError};
use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// Result of crawling a single address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The page was fetched and its links recorded
    Crawled {
        /// Number of addresses that were new to the frontier
        discovered: usize,
    },

    /// The page's content type rules it out as a link source
    Unfetchable {
        /// The normalized (or raw, if unparseable) declared content type
        content_type: String,
    },

    /// The engine left the active status; the address must be retried later
    Cancelled,
}

/// Snapshot returned by [`Engine::get_status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStatus {
    pub status: EngineStatus,
    pub known: BTreeSet<Address>,
    pub pending: BTreeSet<Address>,
    pub in_flight: usize,
}

/// Counters for one batch, logged when it completes
#[derive(Debug, Default, Clone, Copy)]
struct BatchSummary {
    crawled: usize,
    discovered: usize,
    unfetchable: usize,
    retried: usize,
}

struct EngineInner {
    frontier: Arc<dyn Frontier>,
    fetcher: PageFetcher,
    lifecycle: Lifecycle,
    permits: Semaphore,
    max_concurrency: usize,
}

/// The crawl engine
///
/// Cheap to clone; clones share the same lifecycle and frontier. One engine
/// is meant to be constructed per process and handed to the control surface.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Creates an engine with an HTTP client built from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `frontier` - The frontier the engine will read and feed
    ///
    /// # Returns
    ///
    /// * `Ok(Engine)` - Engine in the `Free` status
    /// * `Err(CrawlError)` - The HTTP client could not be built
    pub fn new(config: &Config, frontier: Arc<dyn Frontier>) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.crawler, &config.user_agent)?;
        let fetcher = PageFetcher::new(client, config.crawler.max_body_bytes);
        Ok(Self::with_fetcher(
            fetcher,
            frontier,
            config.crawler.max_concurrency as usize,
        ))
    }

    /// Creates an engine around an existing fetcher
    pub fn with_fetcher(
        fetcher: PageFetcher,
        frontier: Arc<dyn Frontier>,
        max_concurrency: usize,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            inner: Arc::new(EngineInner {
                frontier,
                fetcher,
                lifecycle: Lifecycle::new(),
                permits: Semaphore::new(max_concurrency),
                max_concurrency,
            }),
        }
    }

    /// True iff no crawl is in progress
    pub fn is_available(&self) -> bool {
        self.inner.lifecycle.status().is_free()
    }

    /// Current lifecycle status
    pub fn status(&self) -> EngineStatus {
        self.inner.lifecycle.status()
    }

    /// Subscribes to lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.inner.lifecycle.subscribe()
    }

    /// Number of crawl operations currently executing
    pub fn in_flight(&self) -> usize {
        self.inner.lifecycle.operations_in_flight()
    }

    /// The frontier this engine feeds
    pub fn frontier(&self) -> &Arc<dyn Frontier> {
        &self.inner.frontier
    }

    /// Returns all known and pending addresses; callable at any time
    pub fn get_status(&self) -> Result<CrawlStatus, CrawlError> {
        let snapshot = self.inner.frontier.snapshot()?;
        Ok(CrawlStatus {
            status: self.status(),
            known: snapshot.known,
            pending: snapshot.pending,
            in_flight: self.in_flight(),
        })
    }

    /// Runs a whole crawl starting from `seed`
    ///
    /// Does nothing if a crawl is already in progress. Otherwise the seed is
    /// added to the frontier as known and pending, and the batch loop runs
    /// until the frontier is exhausted or [`Engine::stop`] is called. Any
    /// fault, whether seeding the frontier or escaping the loop itself,
    /// leaves the engine stopped; it is logged, never returned.
    pub async fn start_crawling_from(&self, seed: &str) {
        match self.activate(seed) {
            Ok(Some(generation)) => self.crawl(generation, seed).await,
            Ok(None) => {}
            Err(e) => tracing::error!("Crawl from {} not started: {}", seed, e),
        }
    }

    /// Like [`Engine::start_crawling_from`], but runs the batch loop on a spawned task
    ///
    /// By the time this returns `Ok(Some(_))` the engine is `Active` and the
    /// seed is in the frontier.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(JoinHandle))` - Handle of the task running the batch loop
    /// * `Ok(None)` - A crawl was already in progress
    /// * `Err(CrawlError)` - The seed could not be recorded; the engine is free again
    pub fn spawn_crawl(&self, seed: &str) -> Result<Option<JoinHandle<()>>, CrawlError> {
        let Some(generation) = self.activate(seed)? else {
            return Ok(None);
        };
        let engine = self.clone();
        let seed = seed.to_string();
        Ok(Some(tokio::spawn(async move {
            engine.crawl(generation, &seed).await;
        })))
    }

    /// Moves `Free -> Active` and records the seed as known and pending
    ///
    /// Seeding counts as batch work, so a concurrent [`Engine::stop`] returns
    /// only after the seed is in the frontier.
    fn activate(&self, seed: &str) -> Result<Option<u64>, CrawlError> {
        let lifecycle = &self.inner.lifecycle;
        let _seeding = lifecycle.enter_batch();

        let Some(generation) = lifecycle.try_activate() else {
            tracing::debug!("Crawl already in progress, ignoring start from {}", seed);
            return Ok(None);
        };
        tracing::info!("Starting crawl {} from {}", generation, seed);

        let seed = [seed.to_string()];
        let seeded = self
            .inner
            .frontier
            .add(&seed)
            .and_then(|()| self.inner.frontier.enqueue(&seed));

        if let Err(e) = seeded {
            lifecycle.settle_free();
            return Err(e.into());
        }
        Ok(Some(generation))
    }

    /// Runs the batch loop of run `generation` behind the fatal error boundary
    async fn crawl(&self, generation: u64, seed: &str) {
        let probe = self.inner.lifecycle.probe(generation);

        let result = AssertUnwindSafe(self.run(&probe))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(CrawlError::Panicked {
                    url: seed.to_string(),
                    message: panic_message(panic.as_ref()),
                })
            });

        if let Err(e) = result {
            tracing::error!("Crawl {} aborted: {}", generation, e);
            if probe.is_active() {
                self.stop().await;
            }
        }
    }

    /// Stops the current crawl
    ///
    /// Moves to `Closing`, waits for every in-flight operation and batch to
    /// finish, then settles in `Free`. Harmless when nothing is running.
    pub async fn stop(&self) {
        let lifecycle = &self.inner.lifecycle;
        lifecycle.begin_closing();
        tracing::info!(
            "Stopping crawler, waiting for {} in-flight operations",
            lifecycle.operations_in_flight()
        );
        lifecycle.drained().await;
        lifecycle.settle_free();
        tracing::info!("Crawler stopped");
    }

    /// The batch loop
    async fn run(&self, probe: &ActivityProbe) -> Result<(), CrawlError> {
        let frontier = &self.inner.frontier;

        let mut batches = 0u64;
        loop {
            // Held from dequeue until the retries are back in the frontier.
            // Taken before the activity check so stop() cannot drain in between.
            let batch_guard = self.inner.lifecycle.enter_batch();
            if !probe.is_active() {
                return Ok(());
            }
            let batch = frontier.dequeue_up_to(self.inner.max_concurrency)?;
            if batch.is_empty() {
                drop(batch_guard);
                tracing::info!("There are no tasks left after {} batches", batches);
                if probe.is_active() {
                    self.stop().await;
                }
                return Ok(());
            }

            batches += 1;
            tracing::debug!("Batch {}: crawling {} addresses", batches, batch.len());
            let summary = self.run_batch(batch, probe).await?;
            drop(batch_guard);
            tracing::info!(
                "Batch {} done: {} crawled, {} new addresses, {} unfetchable, {} to retry",
                batches,
                summary.crawled,
                summary.discovered,
                summary.unfetchable,
                summary.retried
            );
        }
    }

    /// Crawls one batch concurrently and re-enqueues what must be retried
    ///
    /// An operation that errors, panics, or reports `Cancelled` never aborts
    /// its siblings; its address goes back to the pending set.
    async fn run_batch(
        &self,
        batch: Vec<Address>,
        probe: &ActivityProbe,
    ) -> Result<BatchSummary, CrawlError> {
        let mut tasks = JoinSet::new();

        for url in batch.iter().cloned() {
            let inner = Arc::clone(&self.inner);
            let probe = probe.clone();
            let guard = inner.lifecycle.enter_operation();

            tasks.spawn(async move {
                let _guard = guard;
                let outcome = AssertUnwindSafe(inner.crawl_page(&url, &probe))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(CrawlError::Panicked {
                            url: url.clone(),
                            message: panic_message(panic.as_ref()),
                        })
                    });
                (url, outcome)
            });
        }

        let mut unsettled: HashSet<Address> = batch.into_iter().collect();
        let mut retry = Vec::new();
        let mut summary = BatchSummary::default();

        while let Some(joined) = tasks.join_next().await {
            let (url, outcome) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!("Crawl task did not complete: {}", e);
                    continue;
                }
            };
            unsettled.remove(&url);

            match outcome {
                Ok(CrawlOutcome::Crawled { discovered }) => {
                    tracing::debug!("Crawled {} ({} new addresses)", url, discovered);
                    summary.crawled += 1;
                    summary.discovered += discovered;
                }
                Ok(CrawlOutcome::Unfetchable { content_type }) => {
                    tracing::debug!("Skipping {}: content type '{}'", url, content_type);
                    summary.unfetchable += 1;
                }
                Ok(CrawlOutcome::Cancelled) => {
                    tracing::debug!("Crawl of {} cancelled, re-enqueueing", url);
                    retry.push(url);
                }
                Err(e) => {
                    tracing::warn!("Crawl of {} failed, re-enqueueing: {}", url, e);
                    retry.push(url);
                }
            }
        }

        retry.extend(unsettled);
        summary.retried = retry.len();
        if !retry.is_empty() {
            self.inner.frontier.enqueue(&retry)?;
        }

        Ok(summary)
    }
}

impl EngineInner {
    /// Crawls a single address
    ///
    /// Fetch strictly precedes extraction, which strictly precedes recording
    /// new addresses. Each step first checks that the run is still active.
    async fn crawl_page(&self, url: &str, probe: &ActivityProbe) -> Result<CrawlOutcome, CrawlError> {
        if !probe.is_active() {
            return Ok(CrawlOutcome::Cancelled);
        }

        // The semaphore is never closed
        let Ok(_permit) = self.permits.acquire().await else {
            return Ok(CrawlOutcome::Cancelled);
        };

        let page = match self.fetcher.fetch(url, probe).await? {
            FetchOutcome::Body(page) => page,
            FetchOutcome::NotParseableContentType(content_type) => {
                self.frontier.mark_unfetchable(url)?;
                return Ok(CrawlOutcome::Unfetchable { content_type });
            }
            FetchOutcome::Cancelled => return Ok(CrawlOutcome::Cancelled),
        };

        if !probe.is_active() {
            return Ok(CrawlOutcome::Cancelled);
        }
        let links = extract_links(url, &page);

        if !probe.is_active() {
            return Ok(CrawlOutcome::Cancelled);
        }
        let discovered = self.frontier.discover(&links)?;
        self.frontier.mark_processed(url)?;

        Ok(CrawlOutcome::Crawled {
            discovered: discovered.len(),
        })
    }
}

/// Extracts a readable message from a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
