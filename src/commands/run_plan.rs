use crate::commands::{write_json, write_text};
use crate::context::{AppContext, ProviderSource};
use crate::plan::load_plan_file;
use crate::report::render_summary;
use anyhow::Result;
use chrono::NaiveDate;
use clap::ValueEnum;
use log::{info, warn};
use std::path::Path;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

pub struct RunOptions<'a> {
    pub plan_path: &'a Path,
    pub provider: ProviderSource,
    pub data_file: Option<&'a Path>,
    pub today: Option<NaiveDate>,
    pub format: OutputFormat,
    pub with_sources: bool,
    pub output: Option<&'a Path>,
}

pub async fn run(app: &AppContext, options: RunOptions<'_>) -> Result<()> {
    let plan = load_plan_file(options.plan_path)?;
    info!(
        "Loaded {} plan item(s) from {}",
        plan.len(),
        options.plan_path.display()
    );

    let backtester = app.backtester(options.provider, options.data_file, options.today)?;
    let report = backtester.run_detailed(&plan).await;

    if !report.failed_tickers.is_empty() {
        warn!(
            "Bars unavailable for {} ticker(s): {}",
            report.failed_tickers.len(),
            report.failed_tickers.join(", ")
        );
    }
    info!(
        "Backtest complete: {} execution(s), hit rate {:.1}%, mean {:.2}%",
        report.result.stats.total(),
        report.result.stats.hit_rate * 100.0,
        report.result.stats.mean * 100.0
    );

    match options.format {
        OutputFormat::Table => write_text(
            &render_summary(&report, options.with_sources),
            options.output,
        ),
        OutputFormat::Json if options.with_sources => write_json(&report, options.output),
        OutputFormat::Json => write_json(&report.result, options.output),
    }
}
