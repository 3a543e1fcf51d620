//! Tiered resolver - five-stage fallback from exact match to estimation
//!
//! Tiers are attempted strictly in order, first success wins:
//! exact match, expanding-radius search, fuzzy coordinate perturbation,
//! authenticated remote lookup, statistical estimation. The final tier
//! never fails, so every coordinate gets a usable result.

use crate::domain::geo::{haversine_m, Coordinate};
use crate::domain::types::{ResolutionResult, ResolutionTier};
use crate::io::provider::{FlowPayload, FlowProvider, LookupOutcome};
use crate::io::spatial::{SpatialStore, StoreRecord};
use crate::services::estimator::FootfallEstimator;
use crate::services::session::SessionManager;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Remote payloads with flow below this are too low to trust and force
/// the estimation blend instead.
const FLOW_FLOOR: i64 = 100;

/// Tuning for the local tiers and the remote rate limit.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Decimal places for exact-match rounding (shared with dedup).
    pub precision: u32,
    /// Expanding radius ladder in meters.
    pub radius_ladder_m: Vec<f64>,
    /// Perturbation offset magnitudes in degrees, applied as +/- to
    /// latitude alone and longitude alone.
    pub fuzzy_offsets_deg: Vec<f64>,
    /// How many rungs of the ladder each fuzzy probe may climb.
    pub fuzzy_radius_rungs: usize,
    /// Fixed delay before each remote call, to stay under the provider's
    /// rate limit.
    pub rate_delay: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            precision: 6,
            radius_ladder_m: vec![50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0],
            fuzzy_offsets_deg: vec![0.001, 0.002],
            fuzzy_radius_rungs: 2,
            rate_delay: Duration::from_millis(150),
        }
    }
}

pub struct TieredResolver<S: SpatialStore, P: FlowProvider> {
    store: Arc<S>,
    provider: Arc<P>,
    session: Arc<SessionManager<P>>,
    estimator: FootfallEstimator,
    settings: ResolverSettings,
}

impl<S: SpatialStore, P: FlowProvider> TieredResolver<S, P> {
    pub fn new(
        store: Arc<S>,
        provider: Arc<P>,
        session: Arc<SessionManager<P>>,
        estimator: FootfallEstimator,
        settings: ResolverSettings,
    ) -> Self {
        Self { store, provider, session, estimator, settings }
    }

    /// Rounding precision in use, shared with the deduplicator.
    pub fn precision(&self) -> u32 {
        self.settings.precision
    }

    /// Resolve one unique coordinate. Never fails: the estimation tier
    /// always produces a result.
    pub async fn resolve(
        &self,
        coord: &Coordinate,
        deadline: Option<Instant>,
    ) -> ResolutionResult {
        if let Some(result) = self.try_exact(coord) {
            return result;
        }
        if let Some(result) = self.try_radius(coord) {
            return result;
        }
        if let Some(result) = self.try_fuzzy(coord) {
            return result;
        }
        self.remote_or_estimate(coord, deadline).await
    }

    /// Tier 1: store record equal to the coordinate under rounding.
    fn try_exact(&self, coord: &Coordinate) -> Option<ResolutionResult> {
        let record = self.store.find_exact(coord, self.settings.precision)?;
        debug!(record_id = record.id, "resolved_exact");
        Some(store_result(&record, ResolutionTier::Exact, 0.0, None, "store-exact".to_string()))
    }

    /// Tier 2: nearest record within the expanding radius ladder.
    fn try_radius(&self, coord: &Coordinate) -> Option<ResolutionResult> {
        for &radius_m in &self.settings.radius_ladder_m {
            let matches = self.store.find_within_radius(coord, radius_m);
            if let Some(best) = matches.first() {
                debug!(
                    record_id = best.record.id,
                    radius_m = radius_m,
                    distance_m = best.distance_m,
                    "resolved_radius"
                );
                return Some(store_result(
                    &best.record,
                    ResolutionTier::Radius,
                    best.distance_m,
                    Some(radius_m),
                    "store-radius".to_string(),
                ));
            }
        }
        None
    }

    /// Tier 3: re-probe with small synthetic offsets. Distances are
    /// reported from the original coordinate, not the probe.
    fn try_fuzzy(&self, coord: &Coordinate) -> Option<ResolutionResult> {
        let rungs = &self.settings.radius_ladder_m
            [..self.settings.fuzzy_radius_rungs.min(self.settings.radius_ladder_m.len())];

        for (probe, dlat, dlng) in self.perturbations(coord) {
            if let Some(record) = self.store.find_exact(&probe, self.settings.precision) {
                return Some(self.fuzzy_hit(coord, &record, dlat, dlng, None));
            }
            for &radius_m in rungs {
                let matches = self.store.find_within_radius(&probe, radius_m);
                if let Some(best) = matches.first() {
                    return Some(self.fuzzy_hit(coord, &best.record, dlat, dlng, Some(radius_m)));
                }
            }
        }
        None
    }

    /// The 8 probe coordinates: each offset applied to latitude alone and
    /// to longitude alone, both signs.
    fn perturbations(&self, coord: &Coordinate) -> SmallVec<[(Coordinate, f64, f64); 8]> {
        let mut probes = SmallVec::new();
        for &offset in &self.settings.fuzzy_offsets_deg {
            for signed in [offset, -offset] {
                probes.push((
                    Coordinate::new(coord.latitude + signed, coord.longitude),
                    signed,
                    0.0,
                ));
                probes.push((
                    Coordinate::new(coord.latitude, coord.longitude + signed),
                    0.0,
                    signed,
                ));
            }
        }
        probes
    }

    fn fuzzy_hit(
        &self,
        origin: &Coordinate,
        record: &StoreRecord,
        dlat: f64,
        dlng: f64,
        radius_used_m: Option<f64>,
    ) -> ResolutionResult {
        let distance_m = haversine_m(origin, &record.coord());
        debug!(
            record_id = record.id,
            dlat = dlat,
            dlng = dlng,
            distance_m = distance_m,
            "resolved_fuzzy"
        );
        store_result(
            record,
            ResolutionTier::Fuzzy,
            distance_m,
            radius_used_m,
            format!("store-fuzzy:dlat={:+},dlng={:+}", dlat, dlng),
        )
    }

    /// Tiers 4 and 5: authenticated remote lookup with degradation to
    /// estimation. This is the only tier with suspension points.
    async fn remote_or_estimate(
        &self,
        coord: &Coordinate,
        deadline: Option<Instant>,
    ) -> ResolutionResult {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("remote_skipped_deadline");
            return self.estimate(None, "deadline-exceeded".to_string());
        }

        tokio::time::sleep(self.settings.rate_delay).await;

        let token = match self.session.get_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "remote_auth_failed");
                return self.estimate(None, format!("auth-failed:{}", e));
            }
        };

        match self.provider.reverse_lookup(coord, &token).await {
            Ok(LookupOutcome::Data(payload)) => self.from_payload(coord, payload),
            Ok(LookupOutcome::NoData) => self.estimate(None, "remote-no-data".to_string()),
            Ok(LookupOutcome::Unauthorized) => {
                // Single re-authentication retry; a second 401 is terminal
                self.session.invalidate().await;
                let token = match self.session.get_token().await {
                    Ok(token) => token,
                    Err(e) => {
                        warn!(error = %e, "remote_auth_failed");
                        return self.estimate(None, format!("auth-failed:{}", e));
                    }
                };
                match self.provider.reverse_lookup(coord, &token).await {
                    Ok(LookupOutcome::Data(payload)) => self.from_payload(coord, payload),
                    Ok(LookupOutcome::NoData) => {
                        self.estimate(None, "remote-no-data".to_string())
                    }
                    Ok(LookupOutcome::Unauthorized) => {
                        self.session.invalidate().await;
                        warn!("remote_unauthorized_after_retry");
                        self.estimate(None, "auth-failed:unauthorized after retry".to_string())
                    }
                    Err(e) => {
                        warn!(error = %e, "remote_lookup_failed");
                        self.estimate(None, format!("remote-error:{}", e))
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "remote_lookup_failed");
                self.estimate(None, format!("remote-error:{}", e))
            }
        }
    }

    /// Classify a 200 payload: trusted flow becomes a Remote result, a
    /// flow under the floor (or absent) forces the estimation blend.
    fn from_payload(&self, coord: &Coordinate, payload: FlowPayload) -> ResolutionResult {
        match payload.flow {
            Some(flow) if flow >= FLOW_FLOOR => {
                debug!(flow = flow, "resolved_remote");
                ResolutionResult {
                    footfall: flow,
                    income_value: payload.income,
                    social_class: payload.social_class,
                    tier: ResolutionTier::Remote,
                    matched: Some(*coord),
                    distance_m: Some(0.0),
                    radius_used_m: None,
                    provenance: "remote".to_string(),
                }
            }
            Some(flow) => {
                debug!(flow = flow, "remote_flow_below_floor");
                self.estimate(Some(payload), "remote-low-flow".to_string())
            }
            None => self.estimate(Some(payload), "remote-no-flow".to_string()),
        }
    }

    /// Tier 5: never fails.
    fn estimate(&self, payload: Option<FlowPayload>, provenance: String) -> ResolutionResult {
        let (footfall, income_value, social_class) = match payload {
            Some(payload) => match payload.income {
                Some(income) => {
                    let estimate =
                        self.estimator.estimate_from_profile(income, payload.social_class.as_deref());
                    (estimate, Some(income), payload.social_class)
                }
                None => (self.estimator.estimate_blind(), None, payload.social_class),
            },
            None => (self.estimator.estimate_blind(), None, None),
        };

        ResolutionResult {
            footfall,
            income_value,
            social_class,
            tier: ResolutionTier::Estimated,
            matched: None,
            distance_m: None,
            radius_used_m: None,
            provenance,
        }
    }
}

fn store_result(
    record: &StoreRecord,
    tier: ResolutionTier,
    distance_m: f64,
    radius_used_m: Option<f64>,
    provenance: String,
) -> ResolutionResult {
    ResolutionResult {
        footfall: record.footfall,
        income_value: record.income_value,
        social_class: record.social_class.clone(),
        tier,
        matched: Some(record.coord()),
        distance_m: Some(distance_m),
        radius_used_m,
        provenance,
    }
}
