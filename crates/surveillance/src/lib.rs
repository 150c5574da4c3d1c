//! Market Surveillance
//!
//! Per-instrument forensic detectors:
//! - Order book analysis (pressure, walls, spoofing, layering, liquidity voids)
//! - Iceberg / hidden liquidity detection from trade clusters
//! - Flow toxicity (VPIN-style volume bucket imbalance)
//! - Algorithmic flow fingerprinting
//!
//! Every detector owns the state for exactly one instrument and is driven
//! synchronously, in arrival order, by that instrument's pipeline. None of
//! them fail on bad data: malformed input is ignored and "not ready" is an
//! explicit state rather than an error.

pub mod book;
pub mod fingerprint;
pub mod iceberg;
pub mod toxicity;

pub use book::{BookAnalysis, BookAnalyzer, BookConfig, BookSide, DominantWall, ManipulationType};
pub use fingerprint::{
    Fingerprint, FingerprintConfig, FingerprintExtractor, FingerprintFeatures, FlowClass,
    ThreatLevel,
};
pub use iceberg::{
    AbsorptionSignal, AbsorptionType, Cluster, DetectorState, IcebergConfig, IcebergDetector,
};
pub use toxicity::{ToxicityConfig, ToxicityEngine, ToxicityState, ToxicityStatus};
