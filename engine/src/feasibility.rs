use model::config::SwapPolicyConfig;
use model::graph::GraphIndex;
use model::route::Route;
use serde::Serialize;

use crate::state::VehicleState;

/// Closed set of rejection reasons a feasibility predicate can report.
/// `ServiceBlocked` is reserved for future hard-service enforcement and is
/// never produced by the predicates below (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Time,
    Lifetime,
    Swap,
    NoPath,
    ServiceBlocked,
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReasonCode::Time => "TIME",
            ReasonCode::Lifetime => "LIFETIME",
            ReasonCode::Swap => "SWAP",
            ReasonCode::NoPath => "NO_PATH",
            ReasonCode::ServiceBlocked => "SERVICE_BLOCKED",
        };
        write!(f, "{s}")
    }
}

/// `Ok(())` when the candidate is feasible, `Err(reason)` otherwise.
pub type FeasibilityResult = Result<(), ReasonCode>;

/// `state.available_from + (edge.time_hours if relocation else 0) <= R.start_time`.
/// Requires the edge to already be known to exist; callers run
/// [`path_exists`] first.
pub fn is_time_feasible(state: &VehicleState, route: &Route, graph: &GraphIndex) -> FeasibilityResult {
    let arrival = if state.current_location_id == route.start_location_id() {
        state.available_from
    } else {
        let edge = graph.edge(state.current_location_id, route.start_location_id()).ok_or(ReasonCode::NoPath)?;
        state.available_from + chrono::Duration::seconds((edge.time.0 * 3600.0).round() as i64)
    };
    if arrival <= route.start_time {
        Ok(())
    } else {
        Err(ReasonCode::Time)
    }
}

/// A relocation is required and no edge exists between the vehicle's
/// current location and the route's start location.
pub fn path_exists(state: &VehicleState, route: &Route, graph: &GraphIndex) -> FeasibilityResult {
    if state.current_location_id == route.start_location_id() {
        return Ok(());
    }
    if graph.edge(state.current_location_id, route.start_location_id()).is_some() {
        Ok(())
    } else {
        Err(ReasonCode::NoPath)
    }
}

/// Hard: `total_lifetime_km + round(R.distance_km) > total_contract_limit_km`.
pub fn is_lifetime_feasible(state: &VehicleState, route: &Route) -> FeasibilityResult {
    match state.total_contract_limit_km {
        Some(limit) if state.total_lifetime_km + route.rounded_distance_km() > limit => Err(ReasonCode::Lifetime),
        _ => Ok(()),
    }
}

/// Hard: reject when the trailing-window swap count is already at the cap
/// and this route would add a new relocation.
pub fn is_swap_feasible(state: &VehicleState, route: &Route, policy: &SwapPolicyConfig) -> FeasibilityResult {
    let would_relocate = state.current_location_id != route.start_location_id();
    if !would_relocate {
        return Ok(());
    }
    let count = state.swaps_in_window(route.start_time, policy.swap_period_days);
    if count as u32 >= policy.max_swaps_per_period {
        Err(ReasonCode::Swap)
    } else {
        Ok(())
    }
}

/// Runs every predicate in priority order `NO_PATH -> TIME -> LIFETIME ->
/// SWAP` and returns the first rejection, or `Ok(())` if the candidate
/// clears all of them. `state` must already be a scoring snapshot with the
/// lease cycle rolled forward to `route.start_time`
/// ([`VehicleState::snapshot_for_scoring`]).
pub fn evaluate(state: &VehicleState, route: &Route, graph: &GraphIndex, swap_policy: &SwapPolicyConfig) -> FeasibilityResult {
    path_exists(state, route, graph)?;
    is_time_feasible(state, route, graph)?;
    is_lifetime_feasible(state, route)?;
    is_swap_feasible(state, route, swap_policy)?;
    Ok(())
}
