use crate::context::{AppContext, ProviderSource};
use crate::plan::{distinct_tickers, load_plan_file};
use crate::snapshot::BarSnapshot;
use anyhow::Result;
use chrono::NaiveDate;
use log::{info, warn};
use std::path::Path;

pub async fn run(
    app: &AppContext,
    plan_path: &Path,
    output_path: &Path,
    provider: ProviderSource,
    today: Option<NaiveDate>,
) -> Result<()> {
    let plan = load_plan_file(plan_path)?;
    let tickers = distinct_tickers(&plan);
    let backtester = app.backtester(provider, None, today)?;
    let range = backtester.date_range(&plan);

    info!(
        "Generating bar snapshot for {} ticker(s) over {} at {}",
        tickers.len(),
        range,
        output_path.display()
    );

    let fetched = backtester.fetch_series(&tickers, range).await;
    if !fetched.failed_tickers.is_empty() {
        warn!(
            "Snapshot omits bars for failed ticker(s): {}",
            fetched.failed_tickers.join(", ")
        );
    }

    let snapshot = BarSnapshot::new(range, fetched.series);
    snapshot.save_to_file(output_path)?;
    info!(
        "Bar snapshot successfully written to {} ({} bars)",
        output_path.display(),
        snapshot.bar_count()
    );

    Ok(())
}
