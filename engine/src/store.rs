use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{instrument, trace};

use model::base_types::{Cost, Km, LocationId, VehicleId};
use model::config::ServicePolicyConfig;
use model::route::Route;
use model::vehicle_spec::VehicleSpec;

use crate::cost::CostBreakdown;
use crate::error::EngineError;
use crate::state::VehicleState;

/// Result of committing a route to a vehicle via [`VehicleStateStore::advance`].
/// Mirrors [`crate::assignment_record::AssignmentRecord::Assigned`] without
/// duplicating the route/vehicle ids, which the caller already has.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvanceOutcome {
    pub requires_relocation: bool,
    pub requires_service: bool,
    pub relocation_cost: Cost,
    pub overage_cost: Cost,
    pub overage_km: Km,
    pub service_penalty: Cost,
    pub total_cost: Cost,
    pub vehicle_km_before: Km,
    pub vehicle_km_after: Km,
}

/// The mutation §4.4 `advance` performs, factored out as a pure function of
/// `(state, route, breakdown) -> state` so it can be reused both by the
/// store's committing `advance` and by the assignment engine's optional
/// chain look-ahead, which needs to simulate several routes ahead without
/// touching committed state (§4.6).
pub fn apply_route(mut state: VehicleState, route: &Route, breakdown: &CostBreakdown, service_policy: &ServicePolicyConfig) -> VehicleState {
    state.roll_lease_cycle(route.start_time);

    let distance = route.rounded_distance_km();

    if breakdown.requires_relocation {
        state.relocations.push_back((route.start_time, state.current_location_id, route.start_location_id()));
    }

    if breakdown.requires_service {
        state.km_since_last_service = 0;
        state.total_service_count += 1;
        state.total_service_cost += service_policy.service_cost_pln;
    } else {
        state.km_since_last_service += distance;
    }

    state.current_odometer_km += distance;
    state.km_this_lease_year += distance;
    state.total_lifetime_km += distance;
    state.current_location_id = route.end_location_id();
    state.last_route_id = Some(route.id);
    state.total_relocation_cost += breakdown.relocation_cost;
    state.total_overage_cost += breakdown.overage_cost;
    state.available_from = if breakdown.requires_service {
        route.end_time + chrono::Duration::hours(service_policy.service_duration_hours)
    } else {
        route.end_time
    };
    state
}

/// Checks the §3 invariants that must hold after every `advance` (§7
/// `Internal`: "invariant violation, e.g. post-`advance` check fails").
/// These are defensive, not load-bearing for correctness the rest of the
/// code already guarantees arithmetically; a failure here means a future
/// change broke one of those guarantees.
fn check_invariants(before: &VehicleState, after: &VehicleState, route: &Route, outcome: &AdvanceOutcome) -> Result<(), EngineError> {
    let expected_km_after = outcome.vehicle_km_before + route.rounded_distance_km();
    if outcome.vehicle_km_after != expected_km_after {
        return Err(EngineError::Internal {
            vehicle: after.vehicle_id,
            route: route.id,
            detail: format!("vehicle_km_after {} != vehicle_km_before {} + round(distance) {}", outcome.vehicle_km_after, outcome.vehicle_km_before, route.rounded_distance_km()),
        });
    }
    if after.current_location_id != route.end_location_id() {
        return Err(EngineError::Internal {
            vehicle: after.vehicle_id,
            route: route.id,
            detail: format!("current_location_id {} != route.end_location_id {}", after.current_location_id, route.end_location_id()),
        });
    }
    if after.total_lifetime_km < before.total_lifetime_km {
        return Err(EngineError::Internal {
            vehicle: after.vehicle_id,
            route: route.id,
            detail: format!("total_lifetime_km decreased from {} to {}", before.total_lifetime_km, after.total_lifetime_km),
        });
    }
    if let Some(limit) = after.total_contract_limit_km {
        if after.total_lifetime_km > limit {
            return Err(EngineError::Internal {
                vehicle: after.vehicle_id,
                route: route.id,
                detail: format!("total_lifetime_km {} exceeds contract limit {}", after.total_lifetime_km, limit),
            });
        }
    }
    Ok(())
}

/// Owns every [`VehicleState`], keyed by vehicle id (§4.4). The only
/// mutation path is [`advance`](VehicleStateStore::advance); everything else
/// is read access, safe to fan out across threads under the read lock held
/// during scoring (§5.1).
pub struct VehicleStateStore {
    states: RwLock<HashMap<VehicleId, VehicleState>>,
}

impl VehicleStateStore {
    /// Seeds one [`VehicleState`] per vehicle from its Phase 1 placement.
    pub fn new(specs: &[VehicleSpec], placement: &HashMap<VehicleId, LocationId>, run_start_time: DateTime<Utc>) -> VehicleStateStore {
        let states = specs
            .iter()
            .map(|spec| {
                let location = placement.get(&spec.id).copied().expect("every vehicle is placed exactly once");
                (spec.id, VehicleState::initial(spec, location, run_start_time))
            })
            .collect();
        VehicleStateStore { states: RwLock::new(states) }
    }

    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        self.states.read().keys().copied().collect()
    }

    /// A read-only clone of the committed state, with no lease roll applied.
    pub fn state(&self, vehicle: VehicleId) -> VehicleState {
        self.states.read().get(&vehicle).cloned().expect("unknown vehicle id")
    }

    /// A cheap, read-only view with the lease cycle rolled forward to
    /// `route.start_time`, used by the cost and feasibility kernels without
    /// mutating committed state (§4.4 item 1).
    pub fn snapshot_for_scoring(&self, vehicle: VehicleId, route: &Route) -> VehicleState {
        self.states
            .read()
            .get(&vehicle)
            .expect("unknown vehicle id")
            .snapshot_for_scoring(route.start_time)
    }

    /// The sole commit path (§4.4 item 2). `breakdown` is the same
    /// [`CostBreakdown`] already computed by the assignment engine's scoring
    /// pass for this winning candidate — `advance` commits it rather than
    /// recomputing, since recomputation would need a graph reference purely
    /// to re-derive a number the caller already has. Rolls the lease cycle
    /// forward, performs service if the breakdown requires it, records a
    /// relocation tuple if one occurred, advances mileage and location, and
    /// accumulates monetary totals.
    #[instrument(skip(self, route, breakdown, service_policy), fields(vehicle = %vehicle, route = %route.id))]
    pub fn advance(
        &self,
        vehicle: VehicleId,
        route: &Route,
        breakdown: &CostBreakdown,
        service_policy: &ServicePolicyConfig,
    ) -> Result<AdvanceOutcome, EngineError> {
        let mut states = self.states.write();
        let entry = states.get_mut(&vehicle).expect("unknown vehicle id");
        let before = entry.clone();
        let vehicle_km_before = before.current_odometer_km;

        let updated = apply_route(entry.clone(), route, breakdown, service_policy);
        let vehicle_km_after = updated.current_odometer_km;

        let outcome = AdvanceOutcome {
            requires_relocation: breakdown.requires_relocation,
            requires_service: breakdown.requires_service,
            relocation_cost: breakdown.relocation_cost,
            overage_cost: breakdown.overage_cost,
            overage_km: breakdown.overage_km,
            service_penalty: breakdown.service_penalty,
            total_cost: breakdown.accounted_cost,
            vehicle_km_before,
            vehicle_km_after,
        };
        check_invariants(&before, &updated, route, &outcome)?;

        *entry = updated;
        trace!(vehicle_km_after, "vehicle advanced");
        Ok(outcome)
    }

    /// Discards relocation tuples older than `now - swap_period_days` for
    /// one vehicle. Must run after each `advance` on that vehicle (§4.4 item 3).
    pub fn prune_swap_window(&self, vehicle: VehicleId, now: DateTime<Utc>, swap_period_days: i64) {
        let mut states = self.states.write();
        let state = states.get_mut(&vehicle).expect("unknown vehicle id");
        state.prune_swap_window(now, swap_period_days);
    }
}
