//! Shared types for the enrichment pipeline

use crate::domain::geo::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cap on failure examples carried in a batch report.
pub const MAX_FAILURE_EXAMPLES: usize = 20;

/// A caller-supplied location record. Raw latitude/longitude are of unknown
/// scale and arrive as JSON numbers or numeric strings; every other field
/// is passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPoint {
    pub id: String,
    pub latitude: Value,
    pub longitude: Value,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl RawPoint {
    pub fn new(id: impl Into<String>, latitude: Value, longitude: Value) -> Self {
        Self { id: id.into(), latitude, longitude, attributes: Map::new() }
    }
}

/// Which fallback stage produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    Exact,
    Radius,
    Fuzzy,
    Remote,
    Estimated,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Exact => "exact",
            ResolutionTier::Radius => "radius",
            ResolutionTier::Fuzzy => "fuzzy",
            ResolutionTier::Remote => "remote",
            ResolutionTier::Estimated => "estimated",
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving one unique coordinate.
///
/// `matched` and `distance_m` are `None` only when `tier` is `Estimated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub footfall: i64,
    pub income_value: Option<f64>,
    pub social_class: Option<String>,
    pub tier: ResolutionTier,
    pub matched: Option<Coordinate>,
    pub distance_m: Option<f64>,
    pub radius_used_m: Option<f64>,
    pub provenance: String,
}

/// A point excluded from resolution because its coordinates could not be
/// normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationFailure {
    pub id: String,
    pub reason: String,
}

/// One output record: the original id and passthrough attributes merged
/// with the resolution outcome for its coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub id: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    pub footfall: i64,
    pub income_value: Option<f64>,
    pub social_class: Option<String>,
    pub resolution_tier: Option<ResolutionTier>,
    pub distance_m: Option<f64>,
    pub provenance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichedRecord {
    /// Annotate a copy of the original point with a resolution result.
    pub fn from_result(point: &RawPoint, result: &ResolutionResult) -> Self {
        Self {
            id: point.id.clone(),
            attributes: point.attributes.clone(),
            footfall: result.footfall,
            income_value: result.income_value,
            social_class: result.social_class.clone(),
            resolution_tier: Some(result.tier),
            distance_m: result.distance_m,
            provenance: result.provenance.clone(),
            error: None,
        }
    }

    /// A record whose coordinates never made it past normalization.
    pub fn from_failure(point: &RawPoint, reason: &str) -> Self {
        Self {
            id: point.id.clone(),
            attributes: point.attributes.clone(),
            footfall: 0,
            income_value: None,
            social_class: None,
            resolution_tier: None,
            distance_m: None,
            provenance: "normalization-failed".to_string(),
            error: Some(reason.to_string()),
        }
    }
}

/// Aggregate counts for one `resolve_batch` invocation. Not persisted;
/// its lifecycle spans exactly one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub total: usize,
    pub unique: usize,
    pub failed_normalization: usize,
    pub exact: usize,
    pub radius: usize,
    pub fuzzy: usize,
    pub remote: usize,
    pub estimated: usize,
    pub failures: Vec<NormalizationFailure>,
}

impl BatchReport {
    pub fn new(batch_id: String) -> Self {
        Self {
            batch_id,
            started_at: Utc::now(),
            elapsed_ms: 0,
            total: 0,
            unique: 0,
            failed_normalization: 0,
            exact: 0,
            radius: 0,
            fuzzy: 0,
            remote: 0,
            estimated: 0,
            failures: Vec::new(),
        }
    }

    /// Count one resolved record against its tier.
    pub fn tally(&mut self, tier: ResolutionTier) {
        match tier {
            ResolutionTier::Exact => self.exact += 1,
            ResolutionTier::Radius => self.radius += 1,
            ResolutionTier::Fuzzy => self.fuzzy += 1,
            ResolutionTier::Remote => self.remote += 1,
            ResolutionTier::Estimated => self.estimated += 1,
        }
    }

    /// Record a normalization failure, keeping at most
    /// `MAX_FAILURE_EXAMPLES` examples for diagnostics.
    pub fn push_failure(&mut self, failure: NormalizationFailure) {
        self.failed_normalization += 1;
        if self.failures.len() < MAX_FAILURE_EXAMPLES {
            self.failures.push(failure);
        }
    }
}
