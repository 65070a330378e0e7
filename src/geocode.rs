// Region-name geocoding with a memoizing, rate-limited cache.
//
// The loader only sees `RegionResolver`. `GeocodeCache` implements it on top
// of any `GeocodeProvider`, so tests swap in fakes and the binary picks a
// provider from configuration.
use crate::config::{GeocoderConfig, ProviderKind};
use crate::error::{DashboardError, Result};
use crate::types::Coordinates;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// External lookup of a free-text place name.
pub trait GeocodeProvider {
    fn lookup(&self, region: &str) -> Result<Option<Coordinates>>;
}

impl GeocodeProvider for Box<dyn GeocodeProvider> {
    fn lookup(&self, region: &str) -> Result<Option<Coordinates>> {
        (**self).lookup(region)
    }
}

/// Get-or-resolve access to region coordinates. `None` means the region
/// could not be located.
pub trait RegionResolver {
    fn resolve(&mut self, region: &str) -> Option<Coordinates>;
}

/// Memoizes provider answers for the lifetime of the value.
///
/// Failed or empty lookups are stored as `None` and never retried; call
/// [`GeocodeCache::clear`] to invalidate. Provider calls are spaced by at
/// least `min_delay`; cache hits return immediately.
pub struct GeocodeCache<P> {
    provider: P,
    entries: HashMap<String, Option<Coordinates>>,
    min_delay: Duration,
    last_call: Option<Instant>,
}

impl<P: GeocodeProvider> GeocodeCache<P> {
    pub fn new(provider: P, min_delay: Duration) -> Self {
        Self {
            provider,
            entries: HashMap::new(),
            min_delay,
            last_call: None,
        }
    }

    #[cfg(test)]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Merge resolved entries persisted by [`GeocodeCache::save`]. Returns
    /// how many were read. A missing file is not an error, and `null`
    /// entries are ignored so unknown regions are retried in the next pass.
    pub fn load(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let text = std::fs::read_to_string(path)?;
        let stored: BTreeMap<String, Option<Coordinates>> = serde_json::from_str(&text)?;
        let resolved: Vec<(String, Option<Coordinates>)> =
            stored.into_iter().filter(|(_, c)| c.is_some()).collect();
        let n = resolved.len();
        self.entries.extend(resolved);
        log::info!("Loaded {n} cached regions from {}", path.display());
        Ok(n)
    }

    /// Persist resolved regions only. The unknown sentinel is scoped to the
    /// cache's lifetime and never written.
    pub fn save(&self, path: &Path) -> Result<()> {
        let sorted: BTreeMap<&str, Coordinates> = self
            .entries
            .iter()
            .filter_map(|(k, v)| v.map(|c| (k.as_str(), c)))
            .collect();
        std::fs::write(path, serde_json::to_string_pretty(&sorted)?)?;
        Ok(())
    }

    fn throttle(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                thread::sleep(self.min_delay - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

impl<P: GeocodeProvider> RegionResolver for GeocodeCache<P> {
    fn resolve(&mut self, region: &str) -> Option<Coordinates> {
        if let Some(hit) = self.entries.get(region) {
            return *hit;
        }
        self.throttle();
        let resolved = match self.provider.lookup(region) {
            Ok(Some(c)) => Some(c),
            Ok(None) => {
                log::warn!("No geocoding result for region {region:?}");
                None
            }
            Err(e) => {
                log::warn!("Geocoding region {region:?} failed: {e}");
                None
            }
        };
        self.entries.insert(region.to_string(), resolved);
        resolved
    }
}

/// OSM Nominatim compatible search endpoint.
pub struct NominatimProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}

impl NominatimProvider {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }
}

impl GeocodeProvider for NominatimProvider {
    fn lookup(&self, region: &str) -> Result<Option<Coordinates>> {
        let hits: Vec<NominatimHit> = self
            .client
            .get(&self.base_url)
            .query(&[("q", region), ("format", "json"), ("limit", "1")])
            .send()?
            .error_for_status()?
            .json()?;
        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };
        let lat = hit.lat.parse::<f64>();
        let lon = hit.lon.parse::<f64>();
        match (lat, lon) {
            (Ok(lat), Ok(lon)) => Ok(Some(Coordinates { lat, lon })),
            _ => Err(DashboardError::Geocode(format!(
                "unparseable coordinates {:?},{:?} for {region:?}",
                hit.lat, hit.lon
            ))),
        }
    }
}

/// Offline lookups from a `Region,Latitude,Longitude` CSV.
pub struct TableProvider {
    table: HashMap<String, Coordinates>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(rename = "Region")]
    region: String,
    #[serde(rename = "Latitude")]
    lat: f64,
    #[serde(rename = "Longitude")]
    lon: f64,
}

impl TableProvider {
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut table = HashMap::new();
        for row in rdr.deserialize::<TableRow>() {
            let row = row?;
            table.insert(row.region, Coordinates { lat: row.lat, lon: row.lon });
        }
        Ok(Self { table })
    }
}

impl GeocodeProvider for TableProvider {
    fn lookup(&self, region: &str) -> Result<Option<Coordinates>> {
        Ok(self.table.get(region).copied())
    }
}

/// Geocoding disabled: every region is unknown.
pub struct NoopProvider;

impl GeocodeProvider for NoopProvider {
    fn lookup(&self, _region: &str) -> Result<Option<Coordinates>> {
        Ok(None)
    }
}

pub fn provider_from_config(cfg: &GeocoderConfig) -> Result<Box<dyn GeocodeProvider>> {
    let provider: Box<dyn GeocodeProvider> = match cfg.provider {
        ProviderKind::Nominatim => Box::new(NominatimProvider::new(
            &cfg.base_url,
            &cfg.user_agent,
            Duration::from_secs(cfg.timeout_secs),
        )?),
        ProviderKind::Table => {
            let path = cfg.table_path.as_deref().ok_or_else(|| {
                DashboardError::Config("geocoder.table_path is not set".to_string())
            })?;
            Box::new(TableProvider::from_path(path)?)
        }
        ProviderKind::None => Box::new(NoopProvider),
    };
    log::info!("Geocoding provider: {:?}", cfg.provider);
    Ok(provider)
}
