// Runtime configuration.
//
// Everything has a default so the binary works without a config file. A
// JSON file can override any subset of fields.
use crate::error::{DashboardError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "DASHBOARD_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub output_dir: PathBuf,
    pub geocoder: GeocoderConfig,
    pub format: FormatConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("db/car_sales.csv"),
            output_dir: PathBuf::from("."),
            geocoder: GeocoderConfig::default(),
            format: FormatConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Nominatim,
    Table,
    None,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Minimum spacing between two provider calls.
    pub min_delay_ms: u64,
    /// `Region,Latitude,Longitude` CSV used by the `table` provider.
    pub table_path: Option<PathBuf>,
    /// Where to persist resolved regions between runs.
    pub cache_path: Option<PathBuf>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Nominatim,
            base_url: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: "car_sales_dashboard".to_string(),
            timeout_secs: 10,
            min_delay_ms: 1000,
            table_path: None,
            cache_path: None,
        }
    }
}

/// Explicit display settings used instead of the process locale.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub currency_symbol: String,
    pub thousands_separator: String,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            thousands_separator: ",".to_string(),
        }
    }
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: DashboardConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve the config from `DASHBOARD_CONFIG`, then `dashboard.json`,
    /// then defaults.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            log::info!("Loading configuration from {path}");
            return Self::from_file(Path::new(&path));
        }
        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.exists() {
            log::info!("Loading configuration from {}", fallback.display());
            return Self::from_file(fallback);
        }
        log::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.geocoder.provider == ProviderKind::Table && self.geocoder.table_path.is_none() {
            return Err(DashboardError::Config(
                "geocoder.table_path is required for the table provider".to_string(),
            ));
        }
        if self.geocoder.timeout_secs == 0 {
            return Err(DashboardError::Config(
                "geocoder.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
