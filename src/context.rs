use crate::backtester::Backtester;
use crate::config::EngineSettings;
use crate::polygon::{PolygonClient, PolygonConfig};
use crate::providers::{GranularityFallback, PriceSeriesProvider};
use crate::snapshot::SnapshotPriceProvider;
use crate::synthetic::SyntheticPriceProvider;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ProviderSource {
    /// Polygon when an API key is configured, synthetic bars otherwise
    #[default]
    Auto,
    Polygon,
    Synthetic,
}

#[derive(Clone)]
pub struct AppContext {
    settings: EngineSettings,
}

impl AppContext {
    pub async fn initialize() -> Result<Self> {
        Ok(Self::with_settings(EngineSettings::from_env()?))
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Picks the bar source for a command. A snapshot file always wins over
    /// the network providers.
    pub fn provider(
        &self,
        source: ProviderSource,
        data_file: Option<&Path>,
    ) -> Result<Arc<dyn PriceSeriesProvider>> {
        if let Some(path) = data_file {
            if source != ProviderSource::Auto {
                warn!(
                    "Ignoring --provider {:?}; serving bars from snapshot {}",
                    source,
                    path.display()
                );
            }
            return Ok(Arc::new(SnapshotPriceProvider::from_file(path)?));
        }

        match source {
            ProviderSource::Synthetic => Ok(Arc::new(SyntheticPriceProvider::new())),
            ProviderSource::Polygon => self.polygon_provider(),
            ProviderSource::Auto => {
                if self.settings.is_demo() {
                    info!("POLYGON_API_KEY not set; using synthetic demo bars");
                    Ok(Arc::new(SyntheticPriceProvider::new()))
                } else {
                    self.polygon_provider()
                }
            }
        }
    }

    fn polygon_provider(&self) -> Result<Arc<dyn PriceSeriesProvider>> {
        let api_key = self.settings.polygon_api_key.clone().ok_or_else(|| {
            anyhow!("POLYGON_API_KEY must be set to fetch bars from Polygon.")
        })?;
        let client = PolygonClient::new(PolygonConfig {
            base_url: self.settings.polygon_base_url.clone(),
            api_key,
            timeout: self.settings.provider_timeout,
            retry_delay: self.settings.provider_retry_delay,
        })?;
        Ok(Arc::new(GranularityFallback::new(
            client,
            self.settings.granularities.clone(),
        )))
    }

    pub fn backtester(
        &self,
        source: ProviderSource,
        data_file: Option<&Path>,
        today: Option<NaiveDate>,
    ) -> Result<Backtester> {
        let provider = self.provider(source, data_file)?;
        let mut backtester =
            Backtester::new(provider).with_default_start(self.settings.default_start_date);
        if let Some(today) = today {
            backtester = backtester.with_today(today);
        }
        Ok(backtester)
    }
}
