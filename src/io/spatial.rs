//! Spatial point store - authoritative measured-footfall records
//!
//! The store holds locations with measured pedestrian flow and the
//! socio-economic profile of their surroundings. The resolver queries it
//! by exact rounded-coordinate match and by expanding radius.

use crate::domain::geo::{haversine_m, resolution_key, Coordinate};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One authoritative record in the spatial store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRecord {
    pub id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub footfall: i64,
    #[serde(default)]
    pub income_value: Option<f64>,
    #[serde(default)]
    pub social_class: Option<String>,
}

impl StoreRecord {
    pub fn coord(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A store record paired with its distance from the queried coordinate.
#[derive(Debug, Clone)]
pub struct SpatialMatch {
    pub record: StoreRecord,
    pub distance_m: f64,
}

/// Query seam for the spatial store.
pub trait SpatialStore: Send + Sync {
    /// Record whose coordinate equals `coord` under `precision`-decimal
    /// rounding, if any. Ties break on the lowest record id.
    fn find_exact(&self, coord: &Coordinate, precision: u32) -> Option<StoreRecord>;

    /// All records within `radius_m` meters, ordered by distance then id.
    fn find_within_radius(&self, coord: &Coordinate, radius_m: f64) -> Vec<SpatialMatch>;
}

/// In-memory store backed by a JSON dataset file.
pub struct InMemoryStore {
    records: Vec<StoreRecord>,
}

impl InMemoryStore {
    pub fn new(records: Vec<StoreRecord>) -> Self {
        Self { records }
    }

    /// Load a dataset file: a JSON array of store records.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset file {}", path.display()))?;
        let records: Vec<StoreRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse dataset file {}", path.display()))?;

        info!(path = %path.display(), records = records.len(), "spatial_dataset_loaded");
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SpatialStore for InMemoryStore {
    fn find_exact(&self, coord: &Coordinate, precision: u32) -> Option<StoreRecord> {
        let key = resolution_key(coord, precision);
        self.records
            .iter()
            .filter(|r| resolution_key(&r.coord(), precision) == key)
            .min_by_key(|r| r.id)
            .cloned()
    }

    fn find_within_radius(&self, coord: &Coordinate, radius_m: f64) -> Vec<SpatialMatch> {
        let mut matches: Vec<SpatialMatch> = self
            .records
            .iter()
            .filter_map(|r| {
                let distance_m = haversine_m(coord, &r.coord());
                (distance_m <= radius_m).then(|| SpatialMatch { record: r.clone(), distance_m })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance_m
                .total_cmp(&b.distance_m)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        matches
    }
}
