//! Shipper configuration
//!
//! Options can come from the environment, from a JSON document, or be set
//! directly. Defaults match a typical web deployment shipping to a
//! `my-app/web` stream.

use crate::core::{Result, ShipperError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Transport used to reach the remote log service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Cloudwatch,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Cloudwatch => write!(f, "cloudwatch"),
        }
    }
}

impl FromStr for Provider {
    type Err = ShipperError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloudwatch" => Ok(Provider::Cloudwatch),
            other => Err(ShipperError::UnknownProvider(other.to_string())),
        }
    }
}

/// Recognized shipper options.
///
/// Numeric thresholds are kept as configured; [`batch_size`](Self::batch_size)
/// and [`flush_interval`](Self::flush_interval) apply the floor of 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipperConfig {
    pub provider: Provider,
    pub group_name: String,
    pub stream_name: String,
    pub region: String,
    /// Service endpoint override; the provider default when absent
    pub endpoint: Option<String>,
    /// Zero or less leaves the group's retention untouched
    pub retention_days: i64,
    pub batch_size: i64,
    pub flush_interval_seconds: i64,
    /// Absent or empty disables the local fallback
    pub fallback_path: Option<PathBuf>,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Cloudwatch,
            group_name: "my-app".to_string(),
            stream_name: "web".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            retention_days: 14,
            batch_size: 50,
            flush_interval_seconds: 2,
            fallback_path: None,
        }
    }
}

impl ShipperConfig {
    pub const ENV_PROVIDER: &'static str = "APP_LOG_PROVIDER";
    pub const ENV_GROUP: &'static str = "CW_LOG_GROUP";
    pub const ENV_STREAM: &'static str = "CW_LOG_STREAM";
    pub const ENV_REGION: &'static str = "AWS_REGION";
    pub const ENV_ENDPOINT: &'static str = "CW_ENDPOINT";
    pub const ENV_RETENTION_DAYS: &'static str = "CW_RETENTION_DAYS";
    pub const ENV_BATCH_SIZE: &'static str = "CW_BATCH_SIZE";
    pub const ENV_FLUSH_SECONDS: &'static str = "CW_FLUSH_SECONDS";
    pub const ENV_FALLBACK_PATH: &'static str = "CW_FALLBACK_PATH";

    /// Load from process environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(provider) = get(Self::ENV_PROVIDER) {
            config.provider = provider.parse()?;
        }
        if let Some(group) = get(Self::ENV_GROUP) {
            config.group_name = group;
        }
        if let Some(stream) = get(Self::ENV_STREAM) {
            config.stream_name = stream;
        }
        if let Some(region) = get(Self::ENV_REGION) {
            config.region = region;
        }
        config.endpoint = get(Self::ENV_ENDPOINT);
        if let Some(days) = get(Self::ENV_RETENTION_DAYS) {
            config.retention_days = parse_int(Self::ENV_RETENTION_DAYS, &days)?;
        }
        if let Some(size) = get(Self::ENV_BATCH_SIZE) {
            config.batch_size = parse_int(Self::ENV_BATCH_SIZE, &size)?;
        }
        if let Some(seconds) = get(Self::ENV_FLUSH_SECONDS) {
            config.flush_interval_seconds = parse_int(Self::ENV_FLUSH_SECONDS, &seconds)?;
        }
        config.fallback_path = get(Self::ENV_FALLBACK_PATH).map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.group_name.trim().is_empty() {
            return Err(ShipperError::config("ShipperConfig", "group name is empty"));
        }
        if self.stream_name.trim().is_empty() {
            return Err(ShipperError::config("ShipperConfig", "stream name is empty"));
        }
        if self.region.trim().is_empty() && self.endpoint.is_none() {
            return Err(ShipperError::config(
                "ShipperConfig",
                "either a region or an endpoint is required",
            ));
        }
        Ok(())
    }

    /// Size threshold, at least 1
    pub fn batch_size(&self) -> usize {
        usize::try_from(self.batch_size.max(1)).unwrap_or(usize::MAX)
    }

    /// Time threshold, at least one second
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds.max(1).unsigned_abs())
    }

    /// Fallback file, if one is configured
    pub fn fallback_path(&self) -> Option<PathBuf> {
        self.fallback_path
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| ShipperError::config(key, format!("expected an integer, got '{value}'")))
}
