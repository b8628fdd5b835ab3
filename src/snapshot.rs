use crate::models::{Bar, DateRange};
use crate::providers::{normalize_series, PriceSeriesProvider, ProviderError, ProviderResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const BAR_SNAPSHOT_VERSION: u32 = 1;
const PROVIDER_NAME: &str = "snapshot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    from: NaiveDate,
    to: NaiveDate,
    series: BTreeMap<String, Vec<Bar>>,
}

impl BarSnapshot {
    pub fn new(range: DateRange, series: BTreeMap<String, Vec<Bar>>) -> Self {
        Self {
            version: BAR_SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            from: range.from,
            to: range.to,
            series,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            from: self.from,
            to: self.to,
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn bar_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open bar snapshot at {}", path.display()))?;
        let reader = BufReader::new(file);
        let snapshot: BarSnapshot =
            bincode::deserialize_from(reader).context("Bar snapshot decode failed")?;

        if snapshot.version != BAR_SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Bar snapshot version mismatch (found {}, expected {})",
                snapshot.version,
                BAR_SNAPSHOT_VERSION
            ));
        }

        info!(
            "Loaded bar snapshot from {} ({} tickers, {} bars, {})",
            path.display(),
            snapshot.series.len(),
            snapshot.bar_count(),
            snapshot.range()
        );
        Ok(snapshot)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create snapshot directory {}", parent.display())
                })?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Unable to create bar snapshot at {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self).context("Bar snapshot encode failed")?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush bar snapshot to {}", path.display()))?;
        Ok(())
    }
}

/// Serves bars from a previously exported snapshot.
pub struct SnapshotPriceProvider {
    snapshot: BarSnapshot,
}

impl SnapshotPriceProvider {
    pub fn new(snapshot: BarSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BarSnapshot::load_from_file(path)?))
    }
}

#[async_trait]
impl PriceSeriesProvider for SnapshotPriceProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_bars(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ProviderResult<Vec<Bar>> {
        if from > to {
            return Err(ProviderError::Snapshot(format!(
                "invalid range {} - {}",
                from, to
            )));
        }
        let requested = DateRange { from, to };
        let bars = self
            .snapshot
            .series
            .get(ticker)
            .map(|series| {
                series
                    .iter()
                    .filter(|bar| requested.contains(bar.day()))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Ok(normalize_series(bars))
    }
}
