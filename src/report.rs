use crate::models::BacktestReport;
use crate::visualization::{format_currency, format_number, format_percent};
use std::fmt::Write;

/// Plain-text summary of a run for terminal output.
pub fn render_summary(report: &BacktestReport, with_sources: bool) -> String {
    let result = &report.result;
    let stats = &result.stats;
    let mut out = String::new();

    let _ = writeln!(out, "Range: {}", report.range);
    let _ = writeln!(
        out,
        "Executions: {} ({} positive, {} non-positive)",
        stats.total(),
        stats.pos,
        stats.neg
    );
    let _ = writeln!(out, "Hit rate: {}", format_percent(stats.hit_rate, 1));
    let _ = writeln!(
        out,
        "Mean: {}  Median: {}  Total: {}",
        format_percent(stats.mean, 2),
        format_percent(stats.median, 2),
        format_percent(stats.total_return, 2)
    );
    if let Some(last) = result.equity_curve.last() {
        let _ = writeln!(
            out,
            "Equity: {} points, final {}",
            result.equity_curve.len(),
            format_number(last.v, 4)
        );
    }
    if !report.failed_tickers.is_empty() {
        let _ = writeln!(out, "Failed tickers: {}", report.failed_tickers.join(", "));
    }
    if !report.empty_tickers.is_empty() {
        let _ = writeln!(out, "No bars: {}", report.empty_tickers.join(", "));
    }

    if result.per_ticker.is_empty() {
        return out;
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<8} {:<10} {:<10} {:>10} {:>10} {:>9} {:>7}",
        "Ticker", "Entry", "Exit", "Entry px", "Exit px", "Return", "Days"
    );
    for (index, execution) in result.per_ticker.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:<8} {:<10} {:<10} {:>10} {:>10} {:>9} {:>7}",
            execution.ticker,
            execution.entry_at.format("%Y-%m-%d"),
            execution.exit_at.format("%Y-%m-%d"),
            format_currency(execution.entry_price, 2),
            format_currency(execution.exit_price, 2),
            format_percent(execution.pct_return, 2),
            format_number(execution.days, 1)
        );
        if with_sources {
            if let Some(sources) = report.sources.get(index) {
                let _ = writeln!(
                    out,
                    "         entry: {} ({})",
                    sources.entry_url, sources.entry_source
                );
                let _ = writeln!(
                    out,
                    "         exit:  {} ({})",
                    sources.exit_url, sources.exit_source
                );
            }
        }
    }

    out
}
