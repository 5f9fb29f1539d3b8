use model::base_types::{Cost, Km};
use model::config::{CostsConfig, ServicePolicyConfig};
use model::graph::GraphIndex;
use model::route::Route;

use crate::state::VehicleState;

/// Breakdown of a single candidate's cost, kept alongside the combined
/// `score` so the assignment log can report each component (§3 `Assignment`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub requires_relocation: bool,
    pub requires_service: bool,
    pub relocation_cost: Cost,
    pub overage_cost: Cost,
    /// Kilometers over `annual_limit_km` this candidate would add, i.e. the
    /// quantity `overage_cost` is priced from. Zero whenever `overage_cost`
    /// is zero.
    pub overage_km: Km,
    pub service_penalty: Cost,
    /// Accounted cost if this candidate is chosen: relocation + overage +
    /// service *cost* (not the scoring penalty). §4.2 "immediate cost used
    /// for accounting... excludes the service penalty and includes the
    /// service cost if a service is actually scheduled."
    pub accounted_cost: Cost,
    /// `relocation + overage + service_penalty`, used to rank candidates.
    pub score: Cost,
}

/// `km_since_last_service + round(distance_km) > service_interval_km + tolerance_km`.
pub fn requires_service(state: &VehicleState, route: &Route, policy: &ServicePolicyConfig) -> bool {
    let projected = state.km_since_last_service + route.rounded_distance_km();
    projected > state.service_interval_km + policy.service_tolerance_km
}

/// `base + distance_km * per_km + time_hours * per_hour`, or `None` when no
/// relocation edge exists at all (feasibility rejects that case first; this
/// is only reached by candidates already known relocation-feasible).
pub fn relocation_cost(state: &VehicleState, route: &Route, graph: &GraphIndex, costs: &CostsConfig) -> Option<Cost> {
    let from = state.current_location_id;
    let to = route.start_location_id();
    if from == to {
        return Some(0.0);
    }
    let edge = graph.edge(from, to)?;
    let distance_km = edge.distance.km()?;
    Some(costs.relocation_base_cost_pln + distance_km * costs.relocation_per_km_pln + edge.time.0 * costs.relocation_per_hour_pln)
}

/// `future = km_this_lease_year + round(distance_km)`; overage only above
/// `annual_limit_km`, computed against the *future* total (§4.2, §9).
pub fn overage_km(state: &VehicleState, route: &Route) -> Km {
    let future: Km = state.km_this_lease_year + route.rounded_distance_km();
    (future - state.annual_limit_km).max(0)
}

pub fn overage_cost(state: &VehicleState, route: &Route, costs: &CostsConfig) -> Cost {
    overage_km(state, route) as Cost * costs.overage_per_km_pln
}

/// Flat `service_penalty_pln` when `requires_service` holds, else zero. A
/// scoring bias only: it never blocks assignment.
pub fn service_penalty(state: &VehicleState, route: &Route, policy: &ServicePolicyConfig) -> Cost {
    if requires_service(state, route, policy) {
        policy.service_penalty_pln
    } else {
        0.0
    }
}

/// Computes the full breakdown for a candidate already known feasible.
/// Returns `None` if a relocation is required but no edge exists — callers
/// should never reach that state since the Feasibility Kernel rejects it
/// first, but the cost kernel stays honest about its own precondition.
pub fn score_candidate(
    state: &VehicleState,
    route: &Route,
    graph: &GraphIndex,
    costs: &CostsConfig,
    service_policy: &ServicePolicyConfig,
) -> Option<CostBreakdown> {
    let requires_relocation = state.current_location_id != route.start_location_id();
    let relocation_cost = relocation_cost(state, route, graph, costs)?;
    let overage_km = overage_km(state, route);
    let overage_cost = overage_km as Cost * costs.overage_per_km_pln;
    let requires_service = requires_service(state, route, service_policy);
    let service_penalty = service_penalty(state, route, service_policy);
    let service_cost_if_scheduled = if requires_service { service_policy.service_cost_pln } else { 0.0 };

    Some(CostBreakdown {
        requires_relocation,
        requires_service,
        relocation_cost,
        overage_cost,
        overage_km,
        service_penalty,
        accounted_cost: relocation_cost + overage_cost + service_cost_if_scheduled,
        score: relocation_cost + overage_cost + service_penalty,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use model::base_types::{Distance, Hours, LocationId, VehicleId};
    use model::vehicle_spec::VehicleSpec;

    use super::*;

    fn dt(day: u32, hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn route(from: u32, to: u32, distance_km: f64) -> Route {
        use model::route::Segment;
        Route::new(
            model::base_types::RouteId(1),
            dt(1, 8),
            dt(1, 12),
            distance_km,
            vec![Segment {
                route_id: model::base_types::RouteId(1),
                seq: 0,
                start_location_id: LocationId(from),
                end_location_id: LocationId(to),
                start_time: dt(1, 8),
                end_time: dt(1, 12),
                relation_id: None,
            }],
        )
        .unwrap()
    }

    fn spec() -> VehicleSpec {
        VehicleSpec::new(VehicleId(1), "WX1", "Scania", 120_000, 0, 150_000, dt(1, 0), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), 0, None).unwrap()
    }

    #[test]
    fn no_relocation_when_already_at_start() {
        let state = VehicleState::initial(&spec(), LocationId(10), dt(1, 0));
        let r = route(10, 10, 100.0);
        let costs = CostsConfig::default();
        assert_eq!(relocation_cost(&state, &r, &GraphIndex::new([]), &costs), Some(0.0));
    }

    #[test]
    fn relocation_requires_an_edge() {
        let state = VehicleState::initial(&spec(), LocationId(20), dt(1, 0));
        let r = route(10, 10, 100.0);
        let costs = CostsConfig::default();
        assert_eq!(relocation_cost(&state, &r, &GraphIndex::new([]), &costs), None);

        let graph = GraphIndex::new([(
            (LocationId(20), LocationId(10)),
            model::graph::Edge { distance: Distance::from_km(300.0), time: Hours(3.5) },
        )]);
        let cost = relocation_cost(&state, &r, &graph, &costs).unwrap();
        assert_eq!(cost, 1_000.0 + 300.0 + 3.5 * 150.0);
    }

    #[test]
    fn overage_applies_only_above_future_limit() {
        let mut state = VehicleState::initial(&spec(), LocationId(10), dt(1, 0));
        state.km_this_lease_year = 149_950;
        state.annual_limit_km = 150_000;
        let r = route(10, 10, 200.0);
        let costs = CostsConfig::default();
        let overage = overage_cost(&state, &r, &costs);
        assert!((overage - 138.0).abs() < 1e-6);
    }

    #[test]
    fn no_overage_below_limit() {
        let state = VehicleState::initial(&spec(), LocationId(10), dt(1, 0));
        let r = route(10, 10, 200.0);
        assert_eq!(overage_cost(&state, &r, &CostsConfig::default()), 0.0);
    }

    #[test]
    fn service_penalty_triggers_past_interval_plus_tolerance() {
        let mut state = VehicleState::initial(&spec(), LocationId(10), dt(1, 0));
        state.service_interval_km = 1_000;
        state.km_since_last_service = 950;
        let r = route(10, 10, 100.0);
        let policy = ServicePolicyConfig::default();
        assert!(requires_service(&state, &r, &policy));
        assert_eq!(service_penalty(&state, &r, &policy), policy.service_penalty_pln);
    }

    #[test]
    fn accounted_cost_excludes_penalty_but_includes_service_cost() {
        let mut state = VehicleState::initial(&spec(), LocationId(10), dt(1, 0));
        state.service_interval_km = 1_000;
        state.km_since_last_service = 950;
        let r = route(10, 10, 100.0);
        let breakdown = score_candidate(&state, &r, &GraphIndex::new([]), &CostsConfig::default(), &ServicePolicyConfig::default()).unwrap();
        assert!(breakdown.requires_service);
        assert_eq!(breakdown.accounted_cost, breakdown.relocation_cost + breakdown.overage_cost + ServicePolicyConfig::default().service_cost_pln);
        assert_eq!(breakdown.score, breakdown.relocation_cost + breakdown.overage_cost + breakdown.service_penalty);
    }
}
