use crate::models::*;

/// Index of the first bar on or after `entry_day` (the first bar when the leg
/// has no instant), falling back to the first bar.
fn entry_index(item: &PlanItem, series: &[Bar]) -> usize {
    let Some(entry_day) = item.entry.utc_day() else {
        return 0;
    };
    series
        .iter()
        .position(|bar| bar.day() >= entry_day)
        .unwrap_or(0)
}

/// Index of the last bar on or before `exit_day` (the last bar when the leg
/// has no instant), falling back to the last bar.
fn exit_index(item: &PlanItem, series: &[Bar]) -> usize {
    let last = series.len() - 1;
    let Some(exit_day) = item.exit.utc_day() else {
        return last;
    };
    series
        .iter()
        .rposition(|bar| bar.day() <= exit_day)
        .unwrap_or(last)
}

/// Matches one plan item against its ticker's ascending bar series.
///
/// Entry fills at the open of the resolved entry bar and exit at the close of
/// the resolved exit bar. Returns `None` when the series is empty or the exit
/// resolves to a bar before the entry.
pub fn resolve_execution(item: &PlanItem, series: &[Bar]) -> Option<Execution> {
    if series.is_empty() {
        return None;
    }

    let entry_idx = entry_index(item, series);
    let exit_idx = exit_index(item, series);
    if exit_idx < entry_idx {
        return None;
    }

    let entry_bar = &series[entry_idx];
    let exit_bar = &series[exit_idx];
    let entry_price = entry_bar.o;
    let exit_price = exit_bar.c;
    let pct_return = (exit_price - entry_price) / entry_price;
    let days = (exit_bar.t - entry_bar.t).num_milliseconds() as f64 / MILLIS_PER_DAY;

    Some(Execution {
        ticker: item.ticker.clone(),
        entry_at: entry_bar.t,
        exit_at: exit_bar.t,
        entry_price,
        exit_price,
        pct_return,
        days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

    fn bar(day: DateTime<Utc>, open: f64, close: f64) -> Bar {
        Bar {
            t: day,
            o: open,
            h: open.max(close) + 0.5,
            l: open.min(close) - 0.5,
            c: close,
            v: 1_000_000.0,
        }
    }

    /// Weekday bars for June 2024 at 20:00 UTC, open = 20 + day, close = open + 0.25.
    fn june_2024_series() -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 20, 0, 0).unwrap();
        (0..30)
            .map(|offset| start + Duration::days(offset))
            .filter(|t| !matches!(t.weekday(), Weekday::Sat | Weekday::Sun))
            .map(|t| {
                let open = 20.0 + t.day() as f64;
                bar(t, open, open + 0.25)
            })
            .collect()
    }

    fn leg(at: &str) -> Leg {
        Leg {
            at: Some(DateTime::parse_from_rfc3339(at).unwrap()),
            source: "press release".to_string(),
            url: "https://example.com/event".to_string(),
        }
    }

    fn item(entry: Leg, exit: Leg) -> PlanItem {
        PlanItem {
            ticker: "TEST".to_string(),
            entry,
            exit,
        }
    }

    #[test]
    fn resolves_index_rebalance_example() {
        let mut series = june_2024_series();
        for b in series.iter_mut() {
            if b.day() == NaiveDate::from_ymd_opt(2024, 6, 7).unwrap() {
                b.o = 28.10;
            }
            if b.day() == NaiveDate::from_ymd_opt(2024, 6, 24).unwrap() {
                b.c = 29.55;
            }
        }
        let plan_item = PlanItem {
            ticker: "KDP".to_string(),
            entry: leg("2024-06-07T17:15:00-04:00"),
            exit: leg("2024-06-24T16:00:00-04:00"),
        };

        let execution = resolve_execution(&plan_item, &series).expect("execution expected");
        assert_eq!(execution.ticker, "KDP");
        assert!((execution.entry_price - 28.10).abs() < 1e-9);
        assert!((execution.exit_price - 29.55).abs() < 1e-9);
        assert!((execution.pct_return - 0.0516).abs() < 1e-4);
        assert!((execution.days - 17.0).abs() < 1e-9);
        assert_eq!(
            execution.pct_return,
            (execution.exit_price - execution.entry_price) / execution.entry_price
        );
    }

    #[test]
    fn date_only_legs_span_whole_series() {
        let series = june_2024_series();
        let plan_item = item(
            Leg::date_only("https://example.com"),
            Leg::date_only("https://example.com"),
        );

        let execution = resolve_execution(&plan_item, &series).unwrap();
        assert_eq!(execution.entry_at, series[0].t);
        assert_eq!(execution.exit_at, series[series.len() - 1].t);
        assert!((execution.entry_price - series[0].o).abs() < 1e-9);
        assert!((execution.exit_price - series[series.len() - 1].c).abs() < 1e-9);
    }

    #[test]
    fn weekend_entry_rolls_forward_to_next_open() {
        let series = june_2024_series();
        // 2024-06-08 is a Saturday.
        let plan_item = item(
            leg("2024-06-08T10:00:00Z"),
            leg("2024-06-20T20:00:00Z"),
        );

        let execution = resolve_execution(&plan_item, &series).unwrap();
        let monday = Utc.with_ymd_and_hms(2024, 6, 10, 20, 0, 0).unwrap();
        assert_eq!(execution.entry_at, monday);
        assert!((execution.entry_price - 30.0).abs() < 1e-9);
    }

    #[test]
    fn weekend_exit_rolls_back_to_prior_close() {
        let series = june_2024_series();
        // 2024-06-16 is a Sunday.
        let plan_item = item(
            leg("2024-06-03T14:00:00Z"),
            leg("2024-06-16T14:00:00Z"),
        );

        let execution = resolve_execution(&plan_item, &series).unwrap();
        let friday = Utc.with_ymd_and_hms(2024, 6, 14, 20, 0, 0).unwrap();
        assert_eq!(execution.exit_at, friday);
        assert!((execution.exit_price - 34.25).abs() < 1e-9);
    }

    #[test]
    fn exit_before_entry_is_dropped() {
        let series = june_2024_series();
        let plan_item = item(
            leg("2024-06-20T14:00:00Z"),
            leg("2024-06-10T14:00:00Z"),
        );
        assert!(resolve_execution(&plan_item, &series).is_none());
    }

    #[test]
    fn same_day_entry_and_exit_is_kept() {
        let series = june_2024_series();
        let plan_item = item(
            leg("2024-06-12T09:00:00Z"),
            leg("2024-06-12T21:00:00Z"),
        );
        let execution = resolve_execution(&plan_item, &series).unwrap();
        assert_eq!(execution.entry_at, execution.exit_at);
        assert!((execution.days - 0.0).abs() < 1e-9);
        assert!((execution.pct_return - 0.25 / 32.0).abs() < 1e-12);
    }

    #[test]
    fn empty_series_produces_nothing() {
        let plan_item = item(
            leg("2024-06-12T09:00:00Z"),
            leg("2024-06-14T21:00:00Z"),
        );
        assert!(resolve_execution(&plan_item, &[]).is_none());
    }

    #[test]
    fn out_of_range_days_fall_back_to_series_edges() {
        let series = june_2024_series();
        // Entry after the last bar falls back to the first bar; exit before the
        // first bar falls back to the last bar.
        let plan_item = item(
            leg("2024-08-01T09:00:00Z"),
            leg("2024-05-01T09:00:00Z"),
        );
        let execution = resolve_execution(&plan_item, &series).unwrap();
        assert_eq!(execution.entry_at, series[0].t);
        assert_eq!(execution.exit_at, series[series.len() - 1].t);
    }

    #[test]
    fn resolution_is_deterministic() {
        let series = june_2024_series();
        let plan_item = item(
            leg("2024-06-04T13:30:00-04:00"),
            leg("2024-06-27T16:00:00-04:00"),
        );
        let first = resolve_execution(&plan_item, &series);
        let second = resolve_execution(&plan_item, &series);
        assert_eq!(first, second);
    }
}
