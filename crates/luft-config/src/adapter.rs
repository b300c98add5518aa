//! Typed view over the merged configuration document.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use luft_core::DEFAULT_DEVICE_DESCRIPTION;
use luft_md::{AreaQuery, LuftdatenFetcher, DEFAULT_BASE_URL};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    pub area: AreaConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
        }
    }
}

/// Circle the upstream filters sensors by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Description stamped on every created device.
    #[serde(default = "default_description")]
    pub description: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            description: default_description(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_description() -> String {
    DEFAULT_DEVICE_DESCRIPTION.to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl AdapterConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: AdapterConfig =
            serde_json::from_value(v.clone()).context("config does not match the adapter schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_seconds == 0 {
            bail!("CONFIG_INVALID polling.interval_seconds must be >= 1");
        }
        if self.api.timeout_seconds == 0 {
            bail!("CONFIG_INVALID api.timeout_seconds must be >= 1");
        }
        let a = &self.area;
        if !a.latitude.is_finite() || !(-90.0..=90.0).contains(&a.latitude) {
            bail!("CONFIG_INVALID area.latitude out of range: {}", a.latitude);
        }
        if !a.longitude.is_finite() || !(-180.0..=180.0).contains(&a.longitude) {
            bail!("CONFIG_INVALID area.longitude out of range: {}", a.longitude);
        }
        if !a.radius_km.is_finite() || a.radius_km <= 0.0 {
            bail!("CONFIG_INVALID area.radius_km must be > 0, got {}", a.radius_km);
        }
        if self.api.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID api.base_url is empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    pub fn area_query(&self) -> AreaQuery {
        AreaQuery {
            latitude: self.area.latitude,
            longitude: self.area.longitude,
            radius_km: self.area.radius_km,
        }
    }

    /// HTTP fetcher for the configured upstream and area.
    pub fn fetcher(&self) -> Result<LuftdatenFetcher> {
        LuftdatenFetcher::new_with_base_url(
            self.api.base_url.clone(),
            self.area_query(),
            self.request_timeout(),
        )
        .context("http client build failed")
    }
}
