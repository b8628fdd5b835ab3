use crate::models::{Bar, Granularity};
use crate::providers::{GranularBarSource, ProviderError, ProviderResult};
use crate::retry::retry_provider_request;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const PROVIDER_NAME: &str = "polygon";
const AGGREGATES_LIMIT: &str = "50000";
pub const MAX_PAGES: usize = 50;
const MAX_ERROR_BODY_CHARS: usize = 2048;

pub const DEFAULT_POLYGON_BASE_URL: &str = "https://api.polygon.io";

#[derive(Debug, Clone)]
pub struct PolygonConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub retry_delay: Duration,
}

pub struct PolygonClient {
    http: Client,
    base_url: String,
    api_key: String,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct AggregatesResponse {
    #[serde(default)]
    results: Option<Vec<Aggregate>>,
    #[serde(default)]
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Aggregate {
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    #[serde(default)]
    v: f64,
}

impl PolygonClient {
    pub fn new(config: PolygonConfig) -> ProviderResult<Self> {
        let api_key = config.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ProviderError::Configuration(
                "POLYGON_API_KEY must not be empty".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER_NAME.to_string(),
                source,
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            retry_delay: config.retry_delay,
        })
    }

    fn aggregates_url(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
        granularity: Granularity,
    ) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            self.base_url,
            ticker,
            granularity.multiplier,
            granularity.timespan.as_str(),
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        )
    }

    /// Fetches one page. `None` means HTTP 404, which on the first page marks an
    /// unknown ticker.
    async fn fetch_page(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> ProviderResult<Option<AggregatesResponse>> {
        let response = self
            .http
            .get(url)
            .query(query)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER_NAME.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: PROVIDER_NAME.to_string(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let payload = response
            .json::<AggregatesResponse>()
            .await
            .map_err(|err| ProviderError::Decode {
                provider: PROVIDER_NAME.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Some(payload))
    }
}

fn bars_from_aggregates(aggregates: Vec<Aggregate>) -> ProviderResult<Vec<Bar>> {
    aggregates
        .into_iter()
        .map(|agg| {
            let t = DateTime::<Utc>::from_timestamp_millis(agg.t).ok_or_else(|| {
                ProviderError::Decode {
                    provider: PROVIDER_NAME.to_string(),
                    reason: format!("timestamp {} out of range", agg.t),
                }
            })?;
            Ok(Bar {
                t,
                o: agg.o,
                h: agg.h,
                l: agg.l,
                c: agg.c,
                v: agg.v,
            })
        })
        .collect()
}

#[async_trait]
impl GranularBarSource for PolygonClient {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch_bars(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
        granularity: Granularity,
    ) -> ProviderResult<Vec<Bar>> {
        let first_url = self.aggregates_url(ticker, from, to, granularity);
        let first_query = [
            ("adjusted", "true"),
            ("sort", "asc"),
            ("limit", AGGREGATES_LIMIT),
        ];

        let mut bars = Vec::new();
        let mut next_url: Option<String> = None;
        let mut pages = 0usize;

        loop {
            if pages >= MAX_PAGES {
                warn!(
                    "Stopped paging {} {} bars for {} after {} pages",
                    PROVIDER_NAME, granularity, ticker, MAX_PAGES
                );
                break;
            }
            pages += 1;

            let url = next_url.as_deref().unwrap_or(first_url.as_str());
            let query: &[(&str, &str)] = if next_url.is_some() {
                &[]
            } else {
                &first_query
            };
            let context = format!(
                "{} {} bars for {} (page {})",
                PROVIDER_NAME, granularity, ticker, pages
            );
            let page =
                retry_provider_request!(context, self.retry_delay, self.fetch_page(url, query))?;

            let Some(page) = page else {
                if pages == 1 {
                    debug!("{} does not know ticker {}", PROVIDER_NAME, ticker);
                    return Ok(Vec::new());
                }
                warn!(
                    "{} page {} of {} bars for {} was not found; keeping {} bars already fetched",
                    PROVIDER_NAME,
                    pages,
                    granularity,
                    ticker,
                    bars.len()
                );
                break;
            };

            bars.extend(bars_from_aggregates(page.results.unwrap_or_default())?);

            match page.next_url.filter(|url| !url.trim().is_empty()) {
                Some(url) => next_url = Some(url),
                None => break,
            }
        }

        Ok(bars)
    }
}
