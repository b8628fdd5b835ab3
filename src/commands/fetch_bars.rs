use crate::commands::write_json;
use crate::context::{AppContext, ProviderSource};
use crate::plan::normalize_ticker_symbol;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use log::info;
use std::path::Path;

pub async fn run(
    app: &AppContext,
    ticker: &str,
    from: NaiveDate,
    to: NaiveDate,
    provider: ProviderSource,
    data_file: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let ticker =
        normalize_ticker_symbol(ticker).ok_or_else(|| anyhow!("Ticker must not be empty"))?;
    if from > to {
        return Err(anyhow!("--from {} is after --to {}", from, to));
    }

    let provider = app.provider(provider, data_file)?;
    let bars = provider.get_bars(&ticker, from, to).await?;
    info!(
        "{} returned {} bar(s) for {} between {} and {}",
        provider.name(),
        bars.len(),
        ticker,
        from,
        to
    );

    write_json(&bars, output)
}
