//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `dedup` - groups a batch by rounded coordinate key
//! - `session` - auth session manager for the remote provider
//! - `estimator` - statistical footfall estimator (last tier)
//! - `resolver` - five-tier fallback resolution for one coordinate
//! - `batch` - batch orchestrator (fan-out, fan-in, report)

pub mod batch;
pub mod dedup;
pub mod estimator;
pub mod resolver;
pub mod session;

// Re-export commonly used types
pub use batch::{BatchOrchestrator, BatchSettings};
pub use estimator::FootfallEstimator;
pub use resolver::{ResolverSettings, TieredResolver};
pub use session::{AuthError, SessionManager};
