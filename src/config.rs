//! Application-level configuration loading, including engine settings and price tiers.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SLOT_RACE_CONFIG_PATH";

const DEFAULT_CONFIRMED_BLOCK_MINUTES: u32 = 60;
const DEFAULT_MINOR_UNITS_PER_POINT: u64 = 100;
const DEFAULT_RECYCLED_SPOT_POINTS_COST: u64 = 10;
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;
const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 5_000;

/// Knobs consumed by the reservation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Minimum length of the interval a confirmed slot blocks.
    pub confirmed_block_minutes: u32,
    /// Minor currency units converted into one loyalty point.
    pub minor_units_per_point: u64,
    /// Points charged for a recycled spot.
    pub recycled_spot_points_cost: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            confirmed_block_minutes: DEFAULT_CONFIRMED_BLOCK_MINUTES,
            minor_units_per_point: DEFAULT_MINOR_UNITS_PER_POINT,
            recycled_spot_points_cost: DEFAULT_RECYCLED_SPOT_POINTS_COST,
        }
    }
}

/// Price of a whole slot for an instructor within a window of the club day.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceTier {
    pub instructor_id: Uuid,
    /// Inclusive start, in minutes since club-local midnight.
    pub from_minute: u16,
    /// Exclusive end, in minutes since club-local midnight.
    pub to_minute: u16,
    /// Price in minor currency units.
    pub unit_price: u64,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    engine: EngineSettings,
    price_tiers: Vec<PriceTier>,
    reconcile_interval: Duration,
    transaction_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        tiers = app_config.price_tiers.len(),
                        "loaded engine configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Build a configuration from explicit parts.
    pub fn new(engine: EngineSettings, price_tiers: Vec<PriceTier>) -> Self {
        Self {
            engine,
            price_tiers,
            ..Self::default()
        }
    }

    /// Replace the transaction timeout; zero disables it.
    pub fn with_transaction_timeout(mut self, limit: Duration) -> Self {
        self.transaction_timeout = limit;
        self
    }

    pub fn engine(&self) -> EngineSettings {
        self.engine
    }

    pub fn price_tiers(&self) -> &[PriceTier] {
        &self.price_tiers
    }

    /// Period of the background blocked-balance reconciliation.
    pub fn reconcile_interval(&self) -> Duration {
        self.reconcile_interval
    }

    /// Upper bound for a single mutating transaction.
    pub fn transaction_timeout(&self) -> Duration {
        self.transaction_timeout
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            price_tiers: Vec::new(),
            reconcile_interval: Duration::from_secs(DEFAULT_RECONCILE_INTERVAL_SECS),
            transaction_timeout: Duration::from_millis(DEFAULT_TRANSACTION_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    confirmed_block_minutes: Option<u32>,
    minor_units_per_point: Option<u64>,
    recycled_spot_points_cost: Option<u64>,
    reconcile_interval_secs: Option<u64>,
    transaction_timeout_ms: Option<u64>,
    pricing: Vec<PriceTier>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let engine = EngineSettings {
            confirmed_block_minutes: value
                .confirmed_block_minutes
                .unwrap_or(DEFAULT_CONFIRMED_BLOCK_MINUTES),
            // Zero would divide by zero when converting currency to points.
            minor_units_per_point: value
                .minor_units_per_point
                .filter(|units| *units > 0)
                .unwrap_or(DEFAULT_MINOR_UNITS_PER_POINT),
            recycled_spot_points_cost: value
                .recycled_spot_points_cost
                .unwrap_or(DEFAULT_RECYCLED_SPOT_POINTS_COST),
        };

        Self {
            engine,
            price_tiers: value
                .pricing
                .into_iter()
                .filter(|tier| tier.from_minute < tier.to_minute)
                .collect(),
            reconcile_interval: Duration::from_secs(
                value
                    .reconcile_interval_secs
                    .unwrap_or(DEFAULT_RECONCILE_INTERVAL_SECS)
                    .max(1),
            ),
            transaction_timeout: Duration::from_millis(
                value
                    .transaction_timeout_ms
                    .unwrap_or(DEFAULT_TRANSACTION_TIMEOUT_MS),
            ),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
