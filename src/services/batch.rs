//! Batch orchestrator - fans unique coordinates out to the resolver
//!
//! Unique resolution keys run under a bounded semaphore so the remote
//! provider's rate limit is respected; results fan back onto every
//! original input record, duplicates included, in input order. One
//! coordinate failing never aborts the batch.

use crate::domain::types::{BatchReport, EnrichedRecord, RawPoint, ResolutionResult, ResolutionTier};
use crate::io::provider::FlowProvider;
use crate::io::spatial::SpatialStore;
use crate::services::dedup;
use crate::services::estimator::FootfallEstimator;
use crate::services::resolver::TieredResolver;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Orchestration knobs. Concurrency is sized against the provider's
/// per-minute rate limit, not system thread limits.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub concurrency: usize,
    /// Overall deadline; coordinates still pending at expiry degrade to
    /// the estimation tier instead of being left unresolved.
    pub deadline: Option<Duration>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { concurrency: 8, deadline: None }
    }
}

pub struct BatchOrchestrator<S: SpatialStore, P: FlowProvider> {
    resolver: Arc<TieredResolver<S, P>>,
    estimator: FootfallEstimator,
    settings: BatchSettings,
}

impl<S, P> BatchOrchestrator<S, P>
where
    S: SpatialStore + 'static,
    P: FlowProvider + 'static,
{
    pub fn new(
        resolver: Arc<TieredResolver<S, P>>,
        estimator: FootfallEstimator,
        settings: BatchSettings,
    ) -> Self {
        Self { resolver, estimator, settings }
    }

    /// Resolve a whole batch. Returns exactly one output record per input
    /// record, in input order, plus the aggregate report.
    pub async fn resolve_batch(
        &self,
        points: Vec<RawPoint>,
    ) -> (Vec<EnrichedRecord>, BatchReport) {
        let batch_id = Uuid::now_v7().to_string();
        let started = std::time::Instant::now();
        let mut report = BatchReport::new(batch_id.clone());
        report.total = points.len();

        let (groups, failures) = dedup::group(&points, self.resolver.precision());
        report.unique = groups.len();

        info!(
            batch_id = %batch_id,
            total = points.len(),
            unique = groups.len(),
            failed_normalization = failures.len(),
            "batch_started"
        );

        let deadline = self.settings.deadline.map(|d| Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (key, entry) in &groups {
            let resolver = self.resolver.clone();
            let semaphore = semaphore.clone();
            let key = key.clone();
            let coord = entry.coord;
            join_set.spawn(async move {
                // Closed semaphore cannot happen here; resolve uncapped
                // rather than drop the coordinate if it ever does
                let _permit = semaphore.acquire_owned().await.ok();
                let result = resolver.resolve(&coord, deadline).await;
                (key, result)
            });
        }

        let mut results: FxHashMap<String, ResolutionResult> = FxHashMap::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((key, result)) => {
                    results.insert(key, result);
                }
                Err(e) => {
                    warn!(batch_id = %batch_id, error = %e, "resolver_task_failed");
                }
            }
        }

        // Fan results back onto every original record, duplicates included
        let mut slots: Vec<Option<EnrichedRecord>> = vec![None; points.len()];
        for (key, entry) in &groups {
            let result = match results.get(key) {
                Some(result) => result.clone(),
                // A panicked worker leaves its key unresolved; degrade to
                // estimation like any other per-coordinate failure
                None => self.degraded_estimate(),
            };
            for &index in &entry.member_indices {
                report.tally(result.tier);
                slots[index] = Some(EnrichedRecord::from_result(&points[index], &result));
            }
        }
        for failed in &failures {
            report.push_failure(failed.failure.clone());
            slots[failed.index] =
                Some(EnrichedRecord::from_failure(&points[failed.index], &failed.failure.reason));
        }

        let records: Vec<EnrichedRecord> =
            slots.into_iter().map(|slot| slot.expect("every input index is covered")).collect();

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            batch_id = %batch_id,
            elapsed_ms = report.elapsed_ms,
            exact = report.exact,
            radius = report.radius,
            fuzzy = report.fuzzy,
            remote = report.remote,
            estimated = report.estimated,
            failed_normalization = report.failed_normalization,
            "batch_completed"
        );

        (records, report)
    }

    fn degraded_estimate(&self) -> ResolutionResult {
        ResolutionResult {
            footfall: self.estimator.estimate_blind(),
            income_value: None,
            social_class: None,
            tier: ResolutionTier::Estimated,
            matched: None,
            distance_m: None,
            radius_used_m: None,
            provenance: "resolver-task-failed".to_string(),
        }
    }
}
