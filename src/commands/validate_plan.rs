use crate::backtester::derive_date_range;
use crate::context::AppContext;
use crate::plan::{distinct_tickers, load_plan_file};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use log::info;
use std::path::Path;

pub async fn run(app: &AppContext, plan_path: &Path, today: Option<NaiveDate>) -> Result<()> {
    let plan = load_plan_file(plan_path)?;
    let tickers = distinct_tickers(&plan);
    let today = today.unwrap_or_else(|| Utc::now().date_naive());
    let range = derive_date_range(&plan, app.settings().default_start_date, today);
    let date_only_legs = plan
        .iter()
        .flat_map(|item| [&item.entry, &item.exit])
        .filter(|leg| leg.is_date_only())
        .count();

    info!(
        "Plan {} is valid: {} item(s), {} ticker(s) [{}], {} date-only leg(s), range {}",
        plan_path.display(),
        plan.len(),
        tickers.len(),
        tickers.join(", "),
        date_only_legs,
        range
    );
    Ok(())
}
