use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MILLIS_PER_DAY: f64 = 86_400_000.0;
pub const DATE_ONLY_SOURCE: &str = "date-only";

/// One side of a plan item, anchored to an event with an optional precise instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub at: Option<DateTime<FixedOffset>>,
    pub source: String,
    pub url: String,
}

impl Leg {
    pub fn date_only(url: impl Into<String>) -> Self {
        Self {
            at: None,
            source: DATE_ONLY_SOURCE.to_string(),
            url: url.into(),
        }
    }

    pub fn is_date_only(&self) -> bool {
        self.at.is_none()
    }

    /// Calendar day of the anchor instant, in UTC.
    pub fn utc_day(&self) -> Option<NaiveDate> {
        self.at.map(|at| at.with_timezone(&Utc).date_naive())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    pub ticker: String,
    pub entry: Leg,
    pub exit: Leg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub t: DateTime<Utc>,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

impl Bar {
    pub fn day(&self) -> NaiveDate {
        self.t.date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub ticker: String,
    pub entry_at: DateTime<Utc>,
    pub exit_at: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pct_return: f64,
    pub days: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestStats {
    pub hit_rate: f64,
    pub mean: f64,
    pub median: f64,
    pub pos: usize,
    pub neg: usize,
    pub total_return: f64,
}

impl BacktestStats {
    pub fn total(&self) -> usize {
        self.pos + self.neg
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub t: String,
    pub v: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub per_ticker: Vec<Execution>,
    pub stats: BacktestStats,
    pub equity_curve: Vec<EquityPoint>,
}

/// Evidence cited by the plan item that produced an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSources {
    pub entry_url: String,
    pub exit_url: String,
    pub entry_source: String,
    pub exit_source: String,
}

impl ExecutionSources {
    pub fn from_item(item: &PlanItem) -> Self {
        Self {
            entry_url: item.entry.url.clone(),
            exit_url: item.exit.url.clone(),
            entry_source: item.entry.source.clone(),
            exit_source: item.exit.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.from && day <= self.to
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}",
            self.from.format("%Y-%m-%d"),
            self.to.format("%Y-%m-%d")
        )
    }
}

/// Detailed outcome of one run. `sources` is aligned with `result.per_ticker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub result: BacktestResult,
    pub sources: Vec<ExecutionSources>,
    pub range: DateRange,
    pub failed_tickers: Vec<String>,
    pub empty_tickers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timespan {
    Minute,
    Hour,
    Day,
    Week,
}

impl Timespan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timespan::Minute => "minute",
            Timespan::Hour => "hour",
            Timespan::Day => "day",
            Timespan::Week => "week",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "minute" | "min" | "m" => Some(Timespan::Minute),
            "hour" | "h" => Some(Timespan::Hour),
            "day" | "d" => Some(Timespan::Day),
            "week" | "w" => Some(Timespan::Week),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Granularity {
    pub multiplier: u32,
    pub timespan: Timespan,
}

impl Granularity {
    pub const DAILY: Granularity = Granularity {
        multiplier: 1,
        timespan: Timespan::Day,
    };

    /// Parses `"<multiplier>/<timespan>"`, e.g. `1/day` or `15/minute`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (multiplier, timespan) = raw.trim().split_once('/')?;
        let multiplier = multiplier.trim().parse::<u32>().ok().filter(|m| *m > 0)?;
        let timespan = Timespan::parse(timespan)?;
        Some(Self {
            multiplier,
            timespan,
        })
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.multiplier, self.timespan.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn leg_day_uses_utc_calendar() {
        let at = DateTime::parse_from_rfc3339("2024-06-07T21:30:00-04:00").unwrap();
        let leg = Leg {
            at: Some(at),
            source: "press release".to_string(),
            url: "https://example.com".to_string(),
        };
        assert_eq!(
            leg.utc_day(),
            Some(NaiveDate::from_ymd_opt(2024, 6, 8).unwrap())
        );
        assert!(Leg::date_only("https://example.com").utc_day().is_none());
    }

    #[test]
    fn execution_serializes_camel_case() {
        let t = Utc.with_ymd_and_hms(2024, 6, 7, 20, 0, 0).unwrap();
        let execution = Execution {
            ticker: "KDP".to_string(),
            entry_at: t,
            exit_at: t,
            entry_price: 28.1,
            exit_price: 29.55,
            pct_return: 0.05,
            days: 0.0,
        };
        let json = serde_json::to_value(&execution).unwrap();
        assert!(json.get("entryPrice").is_some());
        assert!(json.get("pctReturn").is_some());
        assert!(json.get("entry_price").is_none());
    }

    #[test]
    fn parses_granularity_ladder_entries() {
        assert_eq!(Granularity::parse("1/day"), Some(Granularity::DAILY));
        assert_eq!(
            Granularity::parse(" 15 / minute "),
            Some(Granularity {
                multiplier: 15,
                timespan: Timespan::Minute
            })
        );
        assert_eq!(Granularity::parse("0/day"), None);
        assert_eq!(Granularity::parse("1/fortnight"), None);
        assert_eq!(Granularity::DAILY.to_string(), "1/day");
    }
}
