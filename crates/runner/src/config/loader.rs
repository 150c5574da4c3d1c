use std::path::Path;
use thiserror::Error;

use super::types::ForensicsConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Load engine configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ForensicsConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<ForensicsConfig, ConfigError> {
    let config: ForensicsConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<ForensicsConfig, ConfigError> {
    let default_config = include_str!("forensics_config.json");
    load_config_from_str(default_config)
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: format!("must be a positive number, got {}", value),
        })
    }
}

fn non_zero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            field,
            reason: "must be greater than zero".to_string(),
        })
    }
}

impl ForensicsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero("ingest.ring_capacity", self.ingest.ring_capacity)?;
        non_zero("ingest.max_subscribers", self.ingest.max_subscribers)?;
        non_zero(
            "ingest.subscriber_queue_capacity",
            self.ingest.subscriber_queue_capacity,
        )?;
        non_zero("event_capacity", self.event_capacity)?;

        non_zero("book.depth_levels", self.book.depth_levels)?;
        non_zero("book.whale_reference_levels", self.book.whale_reference_levels)?;
        positive("book.spoof_pull_ratio", self.book.spoof_pull_ratio)?;
        positive("book.add_ratio", self.book.add_ratio)?;
        positive("book.whale_multiplier", self.book.whale_multiplier)?;
        positive("book.layering_ratio", self.book.layering_ratio)?;
        positive("book.void_ratio", self.book.void_ratio)?;

        non_zero("iceberg.history_size", self.iceberg.history_size)?;
        non_zero("iceberg.max_clusters", self.iceberg.max_clusters)?;
        positive("iceberg.sensitivity", self.iceberg.sensitivity)?;
        positive("iceberg.dedup_growth", self.iceberg.dedup_growth)?;
        if self.iceberg.cluster_window_ms <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "iceberg.cluster_window_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        positive("toxicity.bucket_size", self.toxicity.bucket_size)?;
        non_zero("toxicity.window_length", self.toxicity.window_length)?;

        non_zero("fingerprint.window", self.fingerprint.window)?;
        if self.fingerprint.min_trades > self.fingerprint.window {
            return Err(ConfigError::InvalidValue {
                field: "fingerprint.min_trades",
                reason: format!(
                    "{} exceeds the window of {}",
                    self.fingerprint.min_trades, self.fingerprint.window
                ),
            });
        }

        positive("strategy.wall_multiplier", self.strategy.wall_multiplier)?;
        positive("strategy.min_spread", self.strategy.min_spread)?;

        non_zero("context.swing_window", self.context.swing_window)?;
        if self.context.delta_window_ms <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "context.delta_window_ms",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.instruments.iter().any(|i| i.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "instruments",
                reason: "instrument names must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
