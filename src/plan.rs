use crate::models::{Leg, PlanItem};
use chrono::DateTime;
use log::warn;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegSide {
    Entry,
    Exit,
}

impl fmt::Display for LegSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegSide::Entry => write!(f, "entry"),
            LegSide::Exit => write!(f, "exit"),
        }
    }
}

/// Caller contract violations, rejected before a plan reaches the engine.
#[derive(Debug, thiserror::Error)]
pub enum PlanValidationError {
    #[error("plan is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("failed to read plan file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plan item {index}: missing ticker")]
    MissingTicker { index: usize },

    #[error("plan item {index}: missing {side} leg")]
    MissingLeg { index: usize, side: LegSide },

    #[error("plan item {index}: {side} leg must be an object with string source and url")]
    InvalidLeg { index: usize, side: LegSide },

    #[error("plan item {index}: {side} timestamp {value:?} is not an ISO-8601 instant with offset")]
    InvalidTimestamp {
        index: usize,
        side: LegSide,
        value: String,
    },

    #[error("plan item {index}: {side} url {value:?} is not a valid URL")]
    InvalidUrl {
        index: usize,
        side: LegSide,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct RawLeg {
    #[serde(default)]
    at: Value,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Fields stay loosely typed so a wrong shape is reported against its item.
#[derive(Debug, Deserialize)]
struct RawPlanItem {
    #[serde(default)]
    ticker: Value,
    #[serde(default)]
    entry: Value,
    #[serde(default)]
    exit: Value,
}

/// Accepts either a bare array of items or a `{ "plan": [...] }` request body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPlan {
    Items(Vec<RawPlanItem>),
    Body { plan: Vec<RawPlanItem> },
}

/// Normalizes a ticker string by trimming whitespace and uppercasing.
pub fn normalize_ticker_symbol(value: &str) -> Option<String> {
    let normalized = value.trim().to_uppercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

pub fn parse_plan(json: &str) -> Result<Vec<PlanItem>, PlanValidationError> {
    let raw: RawPlan = serde_json::from_str(json)?;
    let items = match raw {
        RawPlan::Items(items) => items,
        RawPlan::Body { plan } => plan,
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| validate_item(index, item))
        .collect()
}

pub fn load_plan_file(path: &Path) -> Result<Vec<PlanItem>, PlanValidationError> {
    let json = std::fs::read_to_string(path).map_err(|source| PlanValidationError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_plan(&json)
}

/// Distinct tickers in first-seen order.
pub fn distinct_tickers(plan: &[PlanItem]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    plan.iter()
        .filter(|item| seen.insert(item.ticker.as_str()))
        .map(|item| item.ticker.clone())
        .collect()
}

fn validate_item(index: usize, raw: RawPlanItem) -> Result<PlanItem, PlanValidationError> {
    let ticker = raw
        .ticker
        .as_str()
        .and_then(normalize_ticker_symbol)
        .ok_or(PlanValidationError::MissingTicker { index })?;
    let entry = validate_leg(index, LegSide::Entry, raw.entry)?;
    let exit = validate_leg(index, LegSide::Exit, raw.exit)?;
    Ok(PlanItem {
        ticker,
        entry,
        exit,
    })
}

fn validate_leg(index: usize, side: LegSide, raw: Value) -> Result<Leg, PlanValidationError> {
    let raw: RawLeg = match raw {
        Value::Null => return Err(PlanValidationError::MissingLeg { index, side }),
        value @ Value::Object(_) => serde_json::from_value(value)
            .map_err(|_| PlanValidationError::InvalidLeg { index, side })?,
        _ => return Err(PlanValidationError::InvalidLeg { index, side }),
    };

    let at = match raw.at {
        Value::Null => None,
        Value::String(value) if value.trim().is_empty() => None,
        Value::String(value) => Some(DateTime::parse_from_rfc3339(value.trim()).map_err(|_| {
            PlanValidationError::InvalidTimestamp {
                index,
                side,
                value: value.trim().to_string(),
            }
        })?),
        other => {
            return Err(PlanValidationError::InvalidTimestamp {
                index,
                side,
                value: other.to_string(),
            })
        }
    };

    let url = raw.url.unwrap_or_default().trim().to_string();
    if Url::parse(&url).is_err() {
        return Err(PlanValidationError::InvalidUrl {
            index,
            side,
            value: url,
        });
    }

    let source = raw.source.unwrap_or_default().trim().to_string();
    if at.is_none() && source != crate::models::DATE_ONLY_SOURCE {
        warn!(
            "Plan item {} {} leg has no timestamp but source {:?}; treating it as date-only",
            index, side, source
        );
    }

    Ok(Leg { at, source, url })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const KDP_PLAN: &str = r#"[
        {
            "ticker": " kdp ",
            "entry": {
                "at": "2024-06-07T17:15:00-04:00",
                "source": "S&P DJI press release",
                "url": "https://press.spglobal.com/2024-06-07-rebalance"
            },
            "exit": {
                "at": "2024-06-24T16:00:00-04:00",
                "source": "Exchange closing auction spec (NYSE)",
                "url": "https://www.nyse.com/auctions"
            }
        }
    ]"#;

    #[test]
    fn parses_and_normalizes_items() {
        let plan = parse_plan(KDP_PLAN).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].ticker, "KDP");
        let entry_utc = plan[0].entry.at.unwrap().with_timezone(&Utc);
        assert_eq!(entry_utc, Utc.with_ymd_and_hms(2024, 6, 7, 21, 15, 0).unwrap());
        assert_eq!(plan[0].exit.url, "https://www.nyse.com/auctions");
    }

    #[test]
    fn accepts_request_body_shape_and_date_only_legs() {
        let body = r#"{"plan": [{
            "ticker": "AAPL",
            "entry": {"at": null, "source": "date-only", "url": "https://investor.apple.com/"},
            "exit": {"at": null, "source": "date-only", "url": "https://investor.apple.com/"}
        }]}"#;
        let plan = parse_plan(body).unwrap();
        assert!(plan[0].entry.is_date_only());
        assert!(plan[0].exit.is_date_only());
    }

    #[test]
    fn rejects_blank_ticker_with_index() {
        let body = r#"[
            {"ticker": "AAPL",
             "entry": {"at": null, "source": "date-only", "url": "https://a.example"},
             "exit": {"at": null, "source": "date-only", "url": "https://a.example"}},
            {"ticker": "  ",
             "entry": {"at": null, "source": "date-only", "url": "https://a.example"},
             "exit": {"at": null, "source": "date-only", "url": "https://a.example"}}
        ]"#;
        match parse_plan(body) {
            Err(PlanValidationError::MissingTicker { index }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_timestamp_without_offset() {
        let body = r#"[{"ticker": "AAPL",
            "entry": {"at": "2024-06-07 17:15", "source": "x", "url": "https://a.example"},
            "exit": {"at": null, "source": "date-only", "url": "https://a.example"}}]"#;
        match parse_plan(body) {
            Err(PlanValidationError::InvalidTimestamp { index, side, value }) => {
                assert_eq!(index, 0);
                assert_eq!(side, LegSide::Entry);
                assert_eq!(value, "2024-06-07 17:15");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_missing_leg_and_bad_url() {
        let missing_exit = r#"[{"ticker": "AAPL",
            "entry": {"at": null, "source": "date-only", "url": "https://a.example"}}]"#;
        assert!(matches!(
            parse_plan(missing_exit),
            Err(PlanValidationError::MissingLeg {
                index: 0,
                side: LegSide::Exit
            })
        ));

        let bad_url = r#"[{"ticker": "AAPL",
            "entry": {"at": null, "source": "date-only", "url": "https://a.example"},
            "exit": {"at": null, "source": "date-only", "url": "not a url"}}]"#;
        assert!(matches!(
            parse_plan(bad_url),
            Err(PlanValidationError::InvalidUrl {
                index: 0,
                side: LegSide::Exit,
                ..
            })
        ));
    }

    #[test]
    fn wrongly_typed_fields_are_reported_against_their_item() {
        let numeric_at = r#"[
            {"ticker": "AAPL",
             "entry": {"at": null, "source": "date-only", "url": "https://a.example"},
             "exit": {"at": null, "source": "date-only", "url": "https://a.example"}},
            {"ticker": "MSFT",
             "entry": {"at": 1717795200, "source": "x", "url": "https://a.example"},
             "exit": {"at": null, "source": "date-only", "url": "https://a.example"}}
        ]"#;
        match parse_plan(numeric_at) {
            Err(PlanValidationError::InvalidTimestamp { index, side, value }) => {
                assert_eq!(index, 1);
                assert_eq!(side, LegSide::Entry);
                assert_eq!(value, "1717795200");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let string_leg = r#"[{"ticker": "AAPL",
            "entry": {"at": null, "source": "date-only", "url": "https://a.example"},
            "exit": "2024-06-24"}]"#;
        assert!(matches!(
            parse_plan(string_leg),
            Err(PlanValidationError::InvalidLeg {
                index: 0,
                side: LegSide::Exit
            })
        ));

        let numeric_ticker = r#"[{"ticker": 42,
            "entry": {"at": null, "source": "date-only", "url": "https://a.example"},
            "exit": {"at": null, "source": "date-only", "url": "https://a.example"}}]"#;
        assert!(matches!(
            parse_plan(numeric_ticker),
            Err(PlanValidationError::MissingTicker { index: 0 })
        ));
    }

    #[test]
    fn malformed_json_is_its_own_error() {
        assert!(matches!(
            parse_plan("{not json"),
            Err(PlanValidationError::Malformed(_))
        ));
    }

    #[test]
    fn distinct_tickers_keep_first_seen_order() {
        let leg = Leg::date_only("https://a.example");
        let item = |ticker: &str| PlanItem {
            ticker: ticker.to_string(),
            entry: leg.clone(),
            exit: leg.clone(),
        };
        let plan = vec![item("MSFT"), item("AAPL"), item("MSFT"), item("KDP")];
        assert_eq!(distinct_tickers(&plan), vec!["MSFT", "AAPL", "KDP"]);
    }
}
