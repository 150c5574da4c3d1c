//! Engine configuration file layout
//!
//! One section per component. Every field has a default, so a partial
//! file only needs the values it overrides.

use argus_gateway::IngestConfig;
use argus_strategy::{ContextConfig, DecoderConfig, FusionConfig};
use argus_surveillance::{BookConfig, FingerprintConfig, IcebergConfig, ToxicityConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForensicsConfig {
    /// Instruments tracked at startup
    pub instruments: Vec<String>,
    /// Start tracking an instrument the first time it shows up in the feed
    pub auto_track: bool,
    /// Capacity of the forensic event broadcast
    pub event_capacity: usize,
    pub ingest: IngestConfig,
    pub book: BookConfig,
    pub iceberg: IcebergConfig,
    pub toxicity: ToxicityConfig,
    pub fingerprint: FingerprintConfig,
    pub strategy: DecoderConfig,
    pub context: ContextConfig,
    pub fusion: FusionConfig,
}

impl Default for ForensicsConfig {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            auto_track: true,
            event_capacity: 4096,
            ingest: IngestConfig::default(),
            book: BookConfig::default(),
            iceberg: IcebergConfig::default(),
            toxicity: ToxicityConfig::default(),
            fingerprint: FingerprintConfig::default(),
            strategy: DecoderConfig::default(),
            context: ContextConfig::default(),
            fusion: FusionConfig::default(),
        }
    }
}
