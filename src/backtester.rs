use crate::execution::resolve_execution;
use crate::models::*;
use crate::performance::PerformanceCalculator;
use crate::plan::distinct_tickers;
use crate::providers::PriceSeriesProvider;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// `from` is the earliest entry instant and `to` the latest exit instant,
/// both as UTC calendar days. Missing instants fall back to `default_start`
/// and `today`; `to` never precedes `from`.
pub fn derive_date_range(
    plan: &[PlanItem],
    default_start: NaiveDate,
    today: NaiveDate,
) -> DateRange {
    let min_entry = plan.iter().filter_map(|item| item.entry.at).min();
    let max_exit = plan.iter().filter_map(|item| item.exit.at).max();

    let from = min_entry
        .map(|at| at.with_timezone(&Utc).date_naive())
        .unwrap_or(default_start);
    let to = max_exit
        .map(|at| at.with_timezone(&Utc).date_naive())
        .unwrap_or(today);

    DateRange {
        from,
        to: to.max(from),
    }
}

/// Bars per ticker for one run, plus which tickers failed or came back empty.
pub struct FetchedSeries {
    pub series: BTreeMap<String, Vec<Bar>>,
    pub failed_tickers: Vec<String>,
    pub empty_tickers: Vec<String>,
}

impl FetchedSeries {
    pub fn longest_series_len(&self) -> usize {
        self.series.values().map(Vec::len).max().unwrap_or(0)
    }
}

pub struct Backtester {
    provider: Arc<dyn PriceSeriesProvider>,
    default_start: NaiveDate,
    today: Option<NaiveDate>,
}

impl Backtester {
    pub fn new(provider: Arc<dyn PriceSeriesProvider>) -> Self {
        Self {
            provider,
            default_start: default_start_date(),
            today: None,
        }
    }

    pub fn with_default_start(mut self, default_start: NaiveDate) -> Self {
        self.default_start = default_start;
        self
    }

    /// Pins the "now" fallback for plans without exit instants.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn date_range(&self, plan: &[PlanItem]) -> DateRange {
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        derive_date_range(plan, self.default_start, today)
    }

    /// Requests every ticker concurrently. A failing ticker is logged and
    /// treated as having no data; it never affects the others.
    pub async fn fetch_series(&self, tickers: &[String], range: DateRange) -> FetchedSeries {
        let provider = self.provider.as_ref();
        let requests = tickers.iter().map(|ticker| async move {
            let outcome = provider.get_bars(ticker, range.from, range.to).await;
            (ticker.clone(), outcome)
        });
        let outcomes = join_all(requests).await;

        let mut series = BTreeMap::new();
        let mut failed_tickers = Vec::new();
        let mut empty_tickers = Vec::new();
        for (ticker, outcome) in outcomes {
            let bars = match outcome {
                Ok(bars) => bars,
                Err(err) => {
                    warn!(
                        "{} failed to load bars for {} ({}): {}",
                        provider.name(),
                        ticker,
                        range,
                        err
                    );
                    failed_tickers.push(ticker.clone());
                    Vec::new()
                }
            };
            if bars.is_empty() && !failed_tickers.contains(&ticker) {
                empty_tickers.push(ticker.clone());
            }
            series.insert(ticker, bars);
        }

        FetchedSeries {
            series,
            failed_tickers,
            empty_tickers,
        }
    }

    pub async fn run(&self, plan: &[PlanItem]) -> BacktestResult {
        self.run_detailed(plan).await.result
    }

    pub async fn run_detailed(&self, plan: &[PlanItem]) -> BacktestReport {
        let tickers = distinct_tickers(plan);
        let range = self.date_range(plan);
        info!(
            "Backtesting {} plan item(s) across {} ticker(s) on {} via {}",
            plan.len(),
            tickers.len(),
            range,
            self.provider.name()
        );

        let fetched = self.fetch_series(&tickers, range).await;

        let resolved: Vec<(Execution, ExecutionSources)> = plan
            .par_iter()
            .filter_map(|item| {
                let series = fetched
                    .series
                    .get(&item.ticker)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                resolve_execution(item, series)
                    .map(|execution| (execution, ExecutionSources::from_item(item)))
            })
            .collect();
        let (per_ticker, sources): (Vec<Execution>, Vec<ExecutionSources>) =
            resolved.into_iter().unzip();

        let dropped = plan.len() - per_ticker.len();
        if dropped > 0 {
            info!(
                "{} plan item(s) produced no execution (missing data or exit before entry)",
                dropped
            );
        }

        let aggregation =
            PerformanceCalculator::aggregate(&per_ticker, Some(fetched.longest_series_len()));

        BacktestReport {
            result: BacktestResult {
                per_ticker,
                stats: aggregation.stats,
                equity_curve: aggregation.equity_curve,
            },
            sources,
            range,
            failed_tickers: fetched.failed_tickers,
            empty_tickers: fetched.empty_tickers,
        }
    }
}
