use std::collections::HashMap;

use model::base_types::{Cost, RouteId, VehicleId};
use model::config::{AssignmentConfig, Config};
use model::graph::GraphIndex;
use model::route::Route;
use rayon::prelude::*;
use tracing::{debug, instrument};

use engine::assignment_record::AssignmentRecord;
use engine::cost::{self, CostBreakdown};
use engine::error::EngineError;
use engine::feasibility::{self, ReasonCode};
use engine::progress::{ProgressEvent, ProgressSink};
use engine::store::{apply_route, VehicleStateStore};

/// A feasible candidate for one route, scored and ready to compete for the
/// assignment (§4.6 steps 1–3).
struct Candidate {
    vehicle: VehicleId,
    breakdown: CostBreakdown,
}

fn score_vehicle(vehicle: VehicleId, store: &VehicleStateStore, route: &Route, graph: &GraphIndex, config: &Config) -> Result<Candidate, ReasonCode> {
    let snapshot = store.snapshot_for_scoring(vehicle, route);
    feasibility::evaluate(&snapshot, route, graph, &config.swap_policy)?;
    let breakdown = cost::score_candidate(&snapshot, route, graph, &config.costs, &config.service_policy).ok_or(ReasonCode::NoPath)?;
    Ok(Candidate { vehicle, breakdown })
}

/// Chain-adjusted score for one candidate (§4.6 "Optional look-ahead
/// scoring"): simulate up to `chain_depth` further feasible routes within
/// `look_ahead_days`, convert each look-ahead cost to a bounded score via
/// `1000 / (cost + 100)`, and combine with geometrically diminishing
/// weights `0.5^i`. Disabled by default; the engine is authoritative
/// without it.
fn chain_score(
    candidate: &Candidate,
    store: &VehicleStateStore,
    route: &Route,
    future_routes: &[Route],
    graph: &GraphIndex,
    config: &Config,
) -> Cost {
    let assignment = &config.assignment;
    let mut combined = candidate.breakdown.score;
    let mut state = apply_route(store.state(candidate.vehicle), route, &candidate.breakdown, &config.service_policy);
    let window_end = route.start_time + chrono::Duration::days(assignment.look_ahead_days);

    let mut scanned = 0u32;
    let mut depth = 0u32;
    for future in future_routes {
        if depth >= assignment.chain_depth || scanned >= assignment.max_lookahead_routes {
            break;
        }
        if future.start_time >= window_end {
            break;
        }
        scanned += 1;

        let rolled = {
            let mut shadow = state.clone();
            shadow.roll_lease_cycle(future.start_time);
            shadow
        };
        if feasibility::evaluate(&rolled, future, graph, &config.swap_policy).is_err() {
            continue;
        }
        let Some(breakdown) = cost::score_candidate(&rolled, future, graph, &config.costs, &config.service_policy) else {
            continue;
        };

        depth += 1;
        let weight = 0.5f64.powi(depth as i32);
        let bounded = 1000.0 / (breakdown.score + 100.0);
        combined += weight * bounded;
        state = apply_route(rolled, future, &breakdown, &config.service_policy);
    }

    combined
}

/// Selects the minimum-score candidate, breaking ties by ascending vehicle
/// id for determinism (§4.6 step 4).
fn pick_winner(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .min_by(|a, b| a.breakdown.score.partial_cmp(&b.breakdown.score).unwrap().then(a.vehicle.cmp(&b.vehicle)))
}

/// Selects the minimum combined-score candidate when chain look-ahead is
/// enabled, again breaking ties by ascending vehicle id.
fn pick_winner_by_chain(candidates: &[Candidate], scores: &HashMap<VehicleId, Cost>) -> Option<VehicleId> {
    candidates
        .iter()
        .map(|c| (c.vehicle, scores[&c.vehicle]))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)))
        .map(|(v, _)| v)
}

/// Result of the Phase 2 main loop (§4.6): the ordered assignment log and
/// whether a cooperative cancellation signal cut the run short (§5
/// "Cancellation").
pub struct AssignmentOutput {
    pub records: Vec<AssignmentRecord>,
    pub cancelled: bool,
}

/// Runs the Phase 2 main loop: strictly chronological over `routes`, fanning
/// out per-candidate scoring across vehicles (read-only, parallel) and
/// re-serializing on the winning `advance` (§4.6, §5.1).
#[instrument(skip_all, fields(routes = routes.len()))]
pub fn assign(
    store: &VehicleStateStore,
    routes: &[Route],
    graph: &GraphIndex,
    config: &Config,
    progress: &dyn ProgressSink,
    mut is_cancelled: impl FnMut() -> bool,
) -> Result<AssignmentOutput, EngineError> {
    let vehicle_ids = store.vehicle_ids();
    let mut records = Vec::with_capacity(routes.len());
    let mut cancelled = false;

    // Day-boundary progress events (§4.7) fire independently of the
    // route-count interval below: every `progress_report_days` of route
    // start times crossed, not every Nth route.
    let report_days = config.performance.progress_report_days;
    let mut next_day_threshold = if report_days > 0 {
        routes.first().map(|r| r.start_time + chrono::Duration::days(report_days))
    } else {
        None
    };

    for (index, route) in routes.iter().enumerate() {
        if is_cancelled() {
            cancelled = true;
            break;
        }

        if let Some(threshold) = next_day_threshold {
            if route.start_time >= threshold {
                progress.report(ProgressEvent::DayBoundaryCrossed { day: route.start_time });
                next_day_threshold = Some(threshold + chrono::Duration::days(report_days));
            }
        }

        let results: Vec<Result<Candidate, ReasonCode>> =
            vehicle_ids.par_iter().map(|&vehicle| score_vehicle(vehicle, store, route, graph, config)).collect();

        let candidates: Vec<Candidate> = results.into_iter().filter_map(Result::ok).collect();

        let winner = if config.assignment.use_chain_optimization && !candidates.is_empty() {
            let future_routes = &routes[index + 1..];
            let scores: HashMap<VehicleId, Cost> = candidates
                .iter()
                .map(|c| (c.vehicle, chain_score(c, store, route, future_routes, graph, config)))
                .collect();
            pick_winner_by_chain(&candidates, &scores)
        } else {
            pick_winner(&candidates).map(|c| c.vehicle)
        };

        match winner {
            Some(vehicle) => {
                let breakdown = candidates.iter().find(|c| c.vehicle == vehicle).map(|c| c.breakdown).expect("winner is always among scored candidates");
                let outcome = store.advance(vehicle, route, &breakdown, &config.service_policy)?;
                store.prune_swap_window(vehicle, route.start_time, config.swap_policy.swap_period_days);
                debug!(route = %route.id, vehicle = %vehicle, cost = outcome.total_cost, "assigned");
                records.push(AssignmentRecord::Assigned {
                    route_id: route.id,
                    vehicle_id: vehicle,
                    requires_relocation: outcome.requires_relocation,
                    requires_service: outcome.requires_service,
                    relocation_cost: outcome.relocation_cost,
                    overage_cost: outcome.overage_cost,
                    overage_km: outcome.overage_km,
                    service_penalty: outcome.service_penalty,
                    total_cost: outcome.total_cost,
                    vehicle_km_before: outcome.vehicle_km_before,
                    vehicle_km_after: outcome.vehicle_km_after,
                });
            }
            None => {
                let mut reasons: HashMap<ReasonCode, u32> = HashMap::new();
                for vehicle in &vehicle_ids {
                    if let Err(reason) = score_vehicle(*vehicle, store, route, graph, config) {
                        *reasons.entry(reason).or_insert(0) += 1;
                    }
                }
                records.push(AssignmentRecord::Unassigned { route_id: route.id, reasons });
            }
        }

        if (index as u64 + 1) % config.performance.progress_report_interval as u64 == 0 {
            progress.report(ProgressEvent::RouteProcessed {
                route_id: route.id,
                route_start: route.start_time,
                routes_processed: index as u64 + 1,
                routes_total: routes.len() as u64,
            });
        }
    }

    Ok(AssignmentOutput { records, cancelled })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use model::base_types::LocationId;
    use model::config::{CostsConfig, SwapPolicyConfig};
    use model::graph::Edge;
    use model::route::Segment;
    use model::vehicle_spec::VehicleSpec;

    use super::*;
    use engine::progress::NullProgressSink;

    fn dt(day: u32, hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn route(id: u32, from: u32, to: u32, start: chrono::DateTime<Utc>, distance_km: f64) -> Route {
        Route::new(
            RouteId(id),
            start,
            start + chrono::Duration::hours(4),
            distance_km,
            vec![Segment {
                route_id: RouteId(id),
                seq: 0,
                start_location_id: LocationId(from),
                end_location_id: LocationId(to),
                start_time: start,
                end_time: start + chrono::Duration::hours(4),
                relation_id: None,
            }],
        )
        .unwrap()
    }

    fn spec(id: u32) -> VehicleSpec {
        VehicleSpec::new(VehicleId(id), format!("WX{id}"), "Scania", 120_000, 0, 150_000, dt(1, 0), Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), 0, None).unwrap()
    }

    /// Scenario S1: single route, vehicle already at start.
    #[test]
    fn scenario_s1_single_route_no_relocation() {
        let specs = vec![spec(1)];
        let placement = HashMap::from([(VehicleId(1), LocationId(10))]);
        let store = VehicleStateStore::new(&specs, &placement, dt(1, 0));
        let routes = vec![route(1, 10, 10, dt(1, 8), 100.0)];
        let graph = GraphIndex::new([]);
        let config = Config::default();

        let output = assign(&store, &routes, &graph, &config, &NullProgressSink, || false).unwrap();
        assert_eq!(output.records.len(), 1);
        match &output.records[0] {
            AssignmentRecord::Assigned { vehicle_id, requires_relocation, relocation_cost, overage_cost, .. } => {
                assert_eq!(*vehicle_id, VehicleId(1));
                assert!(!requires_relocation);
                assert_eq!(*relocation_cost, 0.0);
                assert_eq!(*overage_cost, 0.0);
            }
            other => panic!("expected Assigned, got {other:?}"),
        }
        assert_eq!(store.state(VehicleId(1)).km_this_lease_year, 100);
    }

    /// Scenario S2: relocation required, cheaper vehicle wins.
    #[test]
    fn scenario_s2_cheapest_candidate_wins() {
        let specs = vec![spec(1), spec(2)];
        let placement = HashMap::from([(VehicleId(1), LocationId(10)), (VehicleId(2), LocationId(20))]);
        let store = VehicleStateStore::new(&specs, &placement, dt(1, 0));
        let routes = vec![route(1, 10, 10, dt(1, 8), 100.0)];
        let graph = GraphIndex::new([((LocationId(20), LocationId(10)), Edge { distance: model::base_types::Distance::from_km(300.0), time: model::base_types::Hours(3.5) })]);
        let config = Config::default();

        let output = assign(&store, &routes, &graph, &config, &NullProgressSink, || false).unwrap();
        match &output.records[0] {
            AssignmentRecord::Assigned { vehicle_id, .. } => assert_eq!(*vehicle_id, VehicleId(1)),
            other => panic!("expected Assigned, got {other:?}"),
        }
    }

    /// Scenario S3: v1 already used its one allowed swap on 2024-01-05; a
    /// route on 2024-02-01 that would force a second relocation is infeasible
    /// for v1, so v2 (which needs no relocation) wins instead.
    #[test]
    fn scenario_s3_swap_policy_blocks_and_falls_back() {
        let specs = vec![spec(1), spec(2)];
        let placement = HashMap::from([(VehicleId(1), LocationId(1)), (VehicleId(2), LocationId(10))]);
        let store = VehicleStateStore::new(&specs, &placement, dt(1, 0));

        let graph = GraphIndex::new([
            (
                (LocationId(1), LocationId(20)),
                Edge { distance: model::base_types::Distance::from_km(10.0), time: model::base_types::Hours(0.5) },
            ),
            (
                (LocationId(20), LocationId(10)),
                Edge { distance: model::base_types::Distance::from_km(50.0), time: model::base_types::Hours(1.0) },
            ),
        ]);

        // Seed v1's one prior relocation: 1 -> 20 on 2024-01-05.
        let seed_route = route(99, 20, 20, dt(5, 0), 10.0);
        let seed_breakdown = cost::score_candidate(
            &store.snapshot_for_scoring(VehicleId(1), &seed_route),
            &seed_route,
            &graph,
            &CostsConfig::default(),
            &model::config::ServicePolicyConfig::default(),
        )
        .unwrap();
        store.advance(VehicleId(1), &seed_route, &seed_breakdown, &model::config::ServicePolicyConfig::default()).unwrap();
        // v1 is now at location 20, one relocation recorded at 2024-01-05.

        let mut config = Config::default();
        config.swap_policy = SwapPolicyConfig { max_swaps_per_period: 1, swap_period_days: 90 };

        // A route on 2024-02-01 starting at location 10 forces v1 to relocate
        // again (20 -> 10), which the swap cap now forbids; v2, already at
        // 10, needs no relocation and wins.
        let routes = vec![route(1, 10, 10, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(), 50.0)];

        let output = assign(&store, &routes, &graph, &config, &NullProgressSink, || false).unwrap();
        match &output.records[0] {
            AssignmentRecord::Assigned { vehicle_id, .. } => assert_eq!(*vehicle_id, VehicleId(2)),
            other => panic!("expected v2 to win after v1 is swap-blocked, got {other:?}"),
        }
    }

    /// Scenario S5: no path exists, route goes unassigned with NO_PATH.
    #[test]
    fn scenario_s5_no_path_is_unassignable() {
        let specs = vec![spec(1)];
        let placement = HashMap::from([(VehicleId(1), LocationId(5))]);
        let store = VehicleStateStore::new(&specs, &placement, dt(1, 0));
        let routes = vec![route(1, 99, 99, dt(1, 8), 100.0)];
        let graph = GraphIndex::new([]);
        let config = Config::default();

        let output = assign(&store, &routes, &graph, &config, &NullProgressSink, || false).unwrap();
        match &output.records[0] {
            AssignmentRecord::Unassigned { reasons, .. } => {
                assert_eq!(reasons.get(&ReasonCode::NoPath), Some(&1));
            }
            other => panic!("expected Unassigned, got {other:?}"),
        }
    }

    #[test]
    fn determinism_same_inputs_twice_yield_equal_logs() {
        let run = || {
            let specs = vec![spec(1), spec(2)];
            let placement = HashMap::from([(VehicleId(1), LocationId(10)), (VehicleId(2), LocationId(10))]);
            let store = VehicleStateStore::new(&specs, &placement, dt(1, 0));
            let routes = vec![route(1, 10, 10, dt(1, 8), 100.0), route(2, 10, 10, dt(1, 14), 50.0)];
            let graph = GraphIndex::new([]);
            let config = Config::default();
            assign(&store, &routes, &graph, &config, &NullProgressSink, || false).unwrap().records.len()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn cancellation_returns_partial_log() {
        let specs = vec![spec(1)];
        let placement = HashMap::from([(VehicleId(1), LocationId(10))]);
        let store = VehicleStateStore::new(&specs, &placement, dt(1, 0));
        let routes = vec![route(1, 10, 10, dt(1, 8), 100.0), route(2, 10, 10, dt(1, 14), 50.0)];
        let graph = GraphIndex::new([]);
        let config = Config::default();

        let output = assign(&store, &routes, &graph, &config, &NullProgressSink, || true).unwrap();
        assert!(output.cancelled);
        assert!(output.records.is_empty());
    }
}
