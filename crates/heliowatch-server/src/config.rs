// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HelioWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use tracing::warn;

use heliowatch_core::{DEFAULT_CLASSIFIER_URL, DEFAULT_WEATHER_URL};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamSettings {
    /// Weather provider endpoint (GET, JSON body).
    #[serde(default = "default_weather_url")]
    pub weather_url: String,
    /// Fault-classification service base URL.
    #[serde(default = "default_classifier_url")]
    pub classifier_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshSettings {
    /// Cached readings older than this are refetched on demand.
    #[serde(default = "default_staleness_minutes")]
    pub staleness_minutes: u32,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8320
}

fn default_db_path() -> String {
    "./data/heliowatch.db".to_owned()
}

fn default_weather_url() -> String {
    DEFAULT_WEATHER_URL.to_owned()
}

fn default_classifier_url() -> String {
    DEFAULT_CLASSIFIER_URL.to_owned()
}

fn default_staleness_minutes() -> u32 {
    5
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            weather_url: default_weather_url(),
            classifier_url: default_classifier_url(),
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            staleness_minutes: default_staleness_minutes(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: Self =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config, falling back to built-in defaults when the file
    /// does not exist. Parse and validation errors are still fatal.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            warn!("⚠️ Config file {path} not found, using built-in defaults");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.upstream.weather_url.trim().is_empty() {
            bail!("upstream.weather_url must be set");
        }
        if self.upstream.classifier_url.trim().is_empty() {
            bail!("upstream.classifier_url must be set");
        }
        if self.refresh.staleness_minutes == 0 {
            bail!("refresh.staleness_minutes must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8320);
        assert_eq!(config.refresh.staleness_minutes, 5);
        assert_eq!(config.upstream.classifier_url, DEFAULT_CLASSIFIER_URL);
    }

    #[test]
    fn partial_config_overrides_selected_fields() {
        let config: ServerConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [refresh]
            staleness_minutes = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.refresh.staleness_minutes, 10);
        assert_eq!(config.server.bind_address, "0.0.0.0");
    }

    #[test]
    fn zero_staleness_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[refresh]\nstaleness_minutes = 0").unwrap();
        let err = ServerConfig::from_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("staleness_minutes"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ServerConfig::load_or_default("/nonexistent/heliowatch.toml").unwrap();
        assert_eq!(config.server.port, 8320);
    }
}
