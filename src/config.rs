use crate::backtester::default_start_date;
use crate::models::Granularity;
use crate::polygon::DEFAULT_POLYGON_BASE_URL;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::time::Duration;

const POLYGON_API_KEY: &str = "POLYGON_API_KEY";
const POLYGON_BASE_URL: &str = "POLYGON_BASE_URL";
const PROVIDER_TIMEOUT_SECS: &str = "PROVIDER_TIMEOUT_SECS";
const PROVIDER_RETRY_DELAY_MS: &str = "PROVIDER_RETRY_DELAY_MS";
const BAR_GRANULARITIES: &str = "BAR_GRANULARITIES";
const BACKTEST_DEFAULT_START_DATE: &str = "BACKTEST_DEFAULT_START_DATE";

const SETTING_KEYS: [&str; 6] = [
    POLYGON_API_KEY,
    POLYGON_BASE_URL,
    PROVIDER_TIMEOUT_SECS,
    PROVIDER_RETRY_DELAY_MS,
    BAR_GRANULARITIES,
    BACKTEST_DEFAULT_START_DATE,
];

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub polygon_api_key: Option<String>,
    pub polygon_base_url: String,
    pub provider_timeout: Duration,
    pub provider_retry_delay: Duration,
    pub granularities: Vec<Granularity>,
    pub default_start_date: NaiveDate,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            polygon_api_key: None,
            polygon_base_url: DEFAULT_POLYGON_BASE_URL.to_string(),
            provider_timeout: Duration::from_secs(30),
            provider_retry_delay: Duration::from_millis(3000),
            granularities: vec![Granularity::DAILY],
            default_start_date: default_start_date(),
        }
    }
}

impl EngineSettings {
    /// Reads the known keys from the process environment.
    pub fn from_env() -> Result<Self> {
        let settings: HashMap<String, String> = SETTING_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self::from_settings_map(&settings)
    }

    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();

        let polygon_api_key = optional_setting(settings, POLYGON_API_KEY).map(str::to_string);
        let polygon_base_url = optional_setting(settings, POLYGON_BASE_URL)
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or(defaults.polygon_base_url);
        let timeout_secs = optional_setting_u64(settings, PROVIDER_TIMEOUT_SECS, 1)?
            .unwrap_or(defaults.provider_timeout.as_secs());
        let retry_delay_ms = optional_setting_u64(settings, PROVIDER_RETRY_DELAY_MS, 0)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.provider_retry_delay);
        let granularities = optional_setting_granularities(settings, BAR_GRANULARITIES)?
            .unwrap_or(defaults.granularities);
        let default_start_date = optional_setting_date(settings, BACKTEST_DEFAULT_START_DATE)?
            .unwrap_or(defaults.default_start_date);

        Ok(Self {
            polygon_api_key,
            polygon_base_url,
            provider_timeout: Duration::from_secs(timeout_secs),
            provider_retry_delay: retry_delay_ms,
            granularities,
            default_start_date,
        })
    }

    /// Without provider credentials the engine runs on synthetic bars.
    pub fn is_demo(&self) -> bool {
        self.polygon_api_key.is_none()
    }
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn optional_setting_date(
    settings: &HashMap<String, String>,
    key: &str,
) -> Result<Option<NaiveDate>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| {
            anyhow!(
                "Setting {} must be a date in YYYY-MM-DD format (value: {})",
                key,
                raw
            )
        })
}

fn optional_setting_u64(
    settings: &HashMap<String, String>,
    key: &str,
    min: u64,
) -> Result<Option<u64>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    let value = raw
        .parse::<u64>()
        .map_err(|_| anyhow!("Setting {} must be a whole number (value: {})", key, raw))?;
    if value < min {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    Ok(Some(value))
}

fn optional_setting_granularities(
    settings: &HashMap<String, String>,
    key: &str,
) -> Result<Option<Vec<Granularity>>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    let mut values = Vec::new();

    for part in raw.split(',') {
        let entry = part.trim();
        if entry.is_empty() {
            continue;
        }
        let granularity = Granularity::parse(entry).ok_or_else(|| {
            anyhow!(
                "Setting {} must be a list like 1/hour,1/day (value: {})",
                key,
                raw
            )
        })?;
        values.push(granularity);
    }

    if values.is_empty() {
        return Err(anyhow!(
            "Setting {} must contain at least one granularity (value: {})",
            key,
            raw
        ));
    }

    Ok(Some(values))
}
