//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. GEOENRICH_CONFIG environment variable
//! 3. Default: config/dev.toml

use crate::services::batch::BatchSettings;
use crate::services::resolver::ResolverSettings;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_provider_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the JSON dataset of measured-footfall points
    #[serde(default = "default_dataset")]
    pub dataset: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { dataset: default_dataset() }
    }
}

fn default_dataset() -> String {
    "data/points.json".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Decimal places for rounding keys (dedup and exact match)
    #[serde(default = "default_precision")]
    pub precision: u32,
    /// Expanding radius ladder in meters
    #[serde(default = "default_radius_ladder")]
    pub radius_ladder_m: Vec<f64>,
    /// Perturbation offset magnitudes in degrees
    #[serde(default = "default_fuzzy_offsets")]
    pub fuzzy_offsets_deg: Vec<f64>,
    /// Ladder rungs each fuzzy probe may climb
    #[serde(default = "default_fuzzy_radius_rungs")]
    pub fuzzy_radius_rungs: usize,
    /// Delay before each remote call (provider rate limit)
    #[serde(default = "default_rate_delay_ms")]
    pub rate_delay_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            radius_ladder_m: default_radius_ladder(),
            fuzzy_offsets_deg: default_fuzzy_offsets(),
            fuzzy_radius_rungs: default_fuzzy_radius_rungs(),
            rate_delay_ms: default_rate_delay_ms(),
        }
    }
}

fn default_precision() -> u32 {
    6
}

fn default_radius_ladder() -> Vec<f64> {
    vec![50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0]
}

fn default_fuzzy_offsets() -> Vec<f64> {
    vec![0.001, 0.002]
}

fn default_fuzzy_radius_rungs() -> usize {
    2
}

fn default_rate_delay_ms() -> u64 {
    150
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Bounded worker-pool size, sized for the provider's rate limit
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Overall batch deadline in seconds (0 disables it)
    #[serde(default)]
    pub deadline_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: default_concurrency(), deadline_secs: 0 }
    }
}

fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    provider_base_url: String,
    provider_client_id: String,
    provider_client_secret: String,
    provider_timeout_ms: u64,
    dataset: String,
    precision: u32,
    radius_ladder_m: Vec<f64>,
    fuzzy_offsets_deg: Vec<f64>,
    fuzzy_radius_rungs: usize,
    rate_delay_ms: u64,
    concurrency: usize,
    deadline_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_base_url: "http://localhost:8080".to_string(),
            provider_client_id: "geoenrich".to_string(),
            provider_client_secret: String::new(),
            provider_timeout_ms: default_provider_timeout_ms(),
            dataset: default_dataset(),
            precision: default_precision(),
            radius_ladder_m: default_radius_ladder(),
            fuzzy_offsets_deg: default_fuzzy_offsets(),
            fuzzy_radius_rungs: default_fuzzy_radius_rungs(),
            rate_delay_ms: default_rate_delay_ms(),
            concurrency: default_concurrency(),
            deadline_secs: 0,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        // Check GEOENRICH_CONFIG environment variable
        if let Ok(path) = env::var("GEOENRICH_CONFIG") {
            return path;
        }

        // Default to dev.toml
        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            provider_base_url: toml_config.provider.base_url,
            provider_client_id: toml_config.provider.client_id,
            provider_client_secret: toml_config.provider.client_secret,
            provider_timeout_ms: toml_config.provider.timeout_ms,
            dataset: toml_config.store.dataset,
            precision: toml_config.resolver.precision,
            radius_ladder_m: toml_config.resolver.radius_ladder_m,
            fuzzy_offsets_deg: toml_config.resolver.fuzzy_offsets_deg,
            fuzzy_radius_rungs: toml_config.resolver.fuzzy_radius_rungs,
            rate_delay_ms: toml_config.resolver.rate_delay_ms,
            concurrency: toml_config.batch.concurrency,
            deadline_secs: toml_config.batch.deadline_secs,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    // Getters for all config fields
    pub fn provider_base_url(&self) -> &str {
        &self.provider_base_url
    }

    pub fn provider_client_id(&self) -> &str {
        &self.provider_client_id
    }

    pub fn provider_client_secret(&self) -> &str {
        &self.provider_client_secret
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Resolver knobs as a settings struct
    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            precision: self.precision,
            radius_ladder_m: self.radius_ladder_m.clone(),
            fuzzy_offsets_deg: self.fuzzy_offsets_deg.clone(),
            fuzzy_radius_rungs: self.fuzzy_radius_rungs,
            rate_delay: Duration::from_millis(self.rate_delay_ms),
        }
    }

    /// Orchestrator knobs as a settings struct
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            concurrency: self.concurrency,
            deadline: (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs)),
        }
    }
}
