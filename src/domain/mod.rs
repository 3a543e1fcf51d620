//! Domain models - core types of the enrichment pipeline
//!
//! This module contains the canonical data types used throughout the system:
//! - `Coordinate` - a normalized geographic coordinate
//! - `RawPoint` - a caller-supplied location record with passthrough attributes
//! - `ResolutionResult` / `ResolutionTier` - outcome of the tiered resolver
//! - `EnrichedRecord` - a RawPoint annotated with its resolution
//! - `BatchReport` - per-batch aggregate counts and failure examples

pub mod geo;
pub mod types;

// Re-export commonly used types at module level
pub use geo::{haversine_m, normalize_pair, normalize_value, resolution_key, Coordinate, NormalizationError};
pub use types::{
    BatchReport, EnrichedRecord, NormalizationFailure, RawPoint, ResolutionResult, ResolutionTier,
};
