//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `provider` - authenticated HTTP client for the remote flow provider
//! - `spatial` - spatial point store of measured-footfall records
//! - `output` - enriched-record output to file (JSONL format)

pub mod output;
pub mod provider;
pub mod spatial;

// Re-export commonly used types
pub use provider::{
    FlowPayload, FlowProvider, HttpFlowProvider, LookupOutcome, ProviderError, SessionGrant,
};
pub use spatial::{InMemoryStore, SpatialMatch, SpatialStore, StoreRecord};
