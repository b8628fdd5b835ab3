//! Price series providers.
//!
//! The engine only sees [`PriceSeriesProvider`]. Sources that can serve more
//! than one bar period implement [`GranularBarSource`] and are wrapped in a
//! [`GranularityFallback`] that walks a ladder of periods until one returns
//! data.

use crate::models::{Bar, Granularity};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to {provider} failed: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: String },

    #[error("failed to decode {provider} response: {reason}")]
    Decode { provider: String, reason: String },

    #[error("provider configuration error: {0}")]
    Configuration(String),

    #[error("bar snapshot error: {0}")]
    Snapshot(String),
}

impl ProviderError {
    /// Transport failures and rate limits are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport { .. } | ProviderError::RateLimited { .. } => true,
            ProviderError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[async_trait]
pub trait PriceSeriesProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Bars for `ticker` whose calendar day falls in `[from, to]`, ascending.
    /// An unknown ticker yields an empty series rather than an error.
    async fn get_bars(&self, ticker: &str, from: NaiveDate, to: NaiveDate)
        -> ProviderResult<Vec<Bar>>;
}

#[async_trait]
pub trait GranularBarSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_bars(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
        granularity: Granularity,
    ) -> ProviderResult<Vec<Bar>>;
}

pub struct GranularityFallback<S> {
    source: S,
    ladder: Vec<Granularity>,
}

impl<S: GranularBarSource> GranularityFallback<S> {
    pub fn new(source: S, ladder: Vec<Granularity>) -> Self {
        let ladder = if ladder.is_empty() {
            vec![Granularity::DAILY]
        } else {
            ladder
        };
        Self { source, ladder }
    }

    pub fn ladder(&self) -> &[Granularity] {
        &self.ladder
    }
}

#[async_trait]
impl<S: GranularBarSource> PriceSeriesProvider for GranularityFallback<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn get_bars(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<Bar>> {
        for granularity in &self.ladder {
            let bars = self
                .source
                .fetch_bars(ticker, from, to, *granularity)
                .await?;
            if !bars.is_empty() {
                if *granularity != self.ladder[0] {
                    info!(
                        "{}: using {} bars for {} after finer periods returned nothing",
                        self.source.name(),
                        granularity,
                        ticker
                    );
                }
                return Ok(normalize_series(bars));
            }
            debug!(
                "{}: no {} bars for {} between {} and {}",
                self.source.name(),
                granularity,
                ticker,
                from,
                to
            );
        }
        Ok(Vec::new())
    }
}

/// Sorts bars by time and drops repeated timestamps, keeping the first.
pub fn normalize_series(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by(|a, b| a.t.cmp(&b.t));
    bars.dedup_by(|later, earlier| later.t == earlier.t);
    bars
}
