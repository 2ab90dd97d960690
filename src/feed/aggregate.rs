use crate::feed::extract::{digest, DateFormat, ExtractError, FeedDigest};
use crate::feed::fetcher::{FeedFetcher, FetchError};
use crate::feed::sources::FeedSource;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::num::NonZeroUsize;
use std::time::Duration;
use thiserror::Error;

/// Latest posts in feed-list order; failed sources are simply absent.
pub type AggregationResult = Vec<FeedDigest>;

const DEFAULT_CONCURRENCY: usize = 10;

/// Failures that abort a whole aggregation pass.
///
/// Per-source problems never show up here; they are logged and skipped.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Feed fetcher failed: {0}")]
    Fetcher(#[source] FetchError),
    /// The pass exceeded its deadline; no partial result is returned
    #[error("Aggregation timed out after {0:?}")]
    TimedOut(Duration),
    /// The caller cancelled the pass; no partial result is returned
    #[error("Aggregation cancelled")]
    Cancelled,
}

/// How sources are scheduled during one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// One source at a time.
    Sequential,
    /// Up to `limit` fetches in flight.
    Concurrent { limit: NonZeroUsize },
}

impl FetchStrategy {
    /// `0` selects [`FetchStrategy::Sequential`].
    pub fn from_limit(limit: usize) -> Self {
        NonZeroUsize::new(limit).map_or(Self::Sequential, |limit| Self::Concurrent { limit })
    }
}

impl Default for FetchStrategy {
    fn default() -> Self {
        Self::from_limit(DEFAULT_CONCURRENCY)
    }
}

/// Counters for one pass, logged when it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AggregationSummary {
    requested: usize,
    succeeded: usize,
    failed: usize,
    empty: usize,
}

enum SourceFailure {
    Fetch(FetchError),
    Extract(ExtractError),
}

/// Collects the latest post of every feed source.
///
/// # Behavior
///
/// - Each source is fetched and extracted independently; a failure drops
///   only that source
/// - Output order always equals input order, whatever the strategy
/// - A systemic fetcher error ([`FetchError::is_systemic`]) aborts the pass
/// - An optional deadline turns an overrunning pass into
///   [`AggregateError::TimedOut`]; in-flight fetches are abandoned
pub struct Aggregator<F> {
    fetcher: F,
    strategy: FetchStrategy,
    date_format: DateFormat,
    deadline: Option<Duration>,
}

impl<F: FeedFetcher> Aggregator<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            strategy: FetchStrategy::default(),
            date_format: DateFormat::default(),
            deadline: None,
        }
    }

    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_date_format(mut self, date_format: DateFormat) -> Self {
        self.date_format = date_format;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    /// Runs one aggregation pass over `sources`.
    pub async fn aggregate(
        &self,
        sources: &[FeedSource],
    ) -> Result<AggregationResult, AggregateError> {
        self.aggregate_until(sources, std::future::pending()).await
    }

    /// Runs one pass, giving up with [`AggregateError::Cancelled`] as soon as
    /// `cancel` completes.
    pub async fn aggregate_until(
        &self,
        sources: &[FeedSource],
        cancel: impl Future<Output = ()>,
    ) -> Result<AggregationResult, AggregateError> {
        let pass = async {
            match self.deadline {
                Some(limit) => tokio::time::timeout(limit, self.run(sources))
                    .await
                    .map_err(|_| AggregateError::TimedOut(limit))?,
                None => self.run(sources).await,
            }
        };

        tokio::select! {
            biased;
            () = cancel => {
                tracing::warn!(sources = sources.len(), "Aggregation cancelled");
                Err(AggregateError::Cancelled)
            }
            result = pass => result,
        }
    }

    async fn run(&self, sources: &[FeedSource]) -> Result<AggregationResult, AggregateError> {
        // Each outcome lands in the slot of its source index, so completion
        // order never leaks into the result
        let mut slots: Vec<Option<FeedDigest>> = vec![None; sources.len()];
        let mut summary = AggregationSummary {
            requested: sources.len(),
            ..AggregationSummary::default()
        };

        match self.strategy {
            FetchStrategy::Sequential => {
                for (index, source) in sources.iter().enumerate() {
                    let outcome = self.process(source).await;
                    record(&mut slots, &mut summary, index, source, outcome)?;
                }
            }
            FetchStrategy::Concurrent { limit } => {
                let mut outcomes = stream::iter(sources.iter().enumerate())
                    .map(|(index, source)| async move { (index, source, self.process(source).await) })
                    .buffer_unordered(limit.get());

                while let Some((index, source, outcome)) = outcomes.next().await {
                    record(&mut slots, &mut summary, index, source, outcome)?;
                }
            }
        }

        tracing::info!(
            requested = summary.requested,
            succeeded = summary.succeeded,
            failed = summary.failed,
            empty = summary.empty,
            "Aggregation finished"
        );

        Ok(slots.into_iter().flatten().collect())
    }

    async fn process(&self, source: &FeedSource) -> Result<FeedDigest, SourceFailure> {
        let feed = self
            .fetcher
            .fetch(source)
            .await
            .map_err(SourceFailure::Fetch)?;
        digest(&feed, &self.date_format).map_err(SourceFailure::Extract)
    }
}

fn record(
    slots: &mut [Option<FeedDigest>],
    summary: &mut AggregationSummary,
    index: usize,
    source: &FeedSource,
    outcome: Result<FeedDigest, SourceFailure>,
) -> Result<(), AggregateError> {
    match outcome {
        Ok(digest) => {
            slots[index] = Some(digest);
            summary.succeeded += 1;
        }
        Err(SourceFailure::Fetch(e)) if e.is_systemic() => {
            tracing::error!(source = %source, error = %e, "Feed fetcher unusable, aborting aggregation");
            return Err(AggregateError::Fetcher(e));
        }
        Err(SourceFailure::Fetch(e)) => {
            tracing::warn!(
                source = %source,
                kind = e.kind(),
                error = %e,
                "Skipping feed that could not be loaded"
            );
            summary.failed += 1;
        }
        Err(SourceFailure::Extract(e)) => {
            tracing::info!(source = %source, error = %e, "Skipping feed without posts");
            summary.empty += 1;
        }
    }
    Ok(())
}
