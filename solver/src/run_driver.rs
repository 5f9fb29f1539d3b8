//! Orchestrates Placement → Assignment and produces the run-level aggregate
//! (§4.7). The only entry point the CLI and HTTP surfaces call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use model::base_types::{Cost, Km, LocationId, VehicleId};
use model::config::Config;
use model::graph::GraphIndex;
use model::location::Location;
use model::route::Route;
use model::vehicle_spec::VehicleSpec;

use engine::assignment_record::AssignmentRecord;
use engine::error::EngineError;
use engine::feasibility::ReasonCode;
use engine::progress::{ProgressEvent, ProgressSink};
use engine::state::VehicleState;
use engine::store::VehicleStateStore;

use crate::{assignment, placement};

/// Routes restricted to `[t0, t0 + assignment_lookahead_days)`; `0` means
/// "all routes" (§4.6 "Input").
fn assignment_window(routes: &[Route], lookahead_days: i64, t0: chrono::DateTime<Utc>) -> Vec<Route> {
    if lookahead_days <= 0 {
        return routes.to_vec();
    }
    let window_end = t0 + chrono::Duration::days(lookahead_days);
    routes.iter().filter(|r| r.start_time < window_end).cloned().collect()
}

/// Run-level aggregate (§4.7, §6.3): total cost, counts of relocations and
/// services, overage kilometers, and unassigned routes by reason. Echoes the
/// configuration that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_cost: Cost,
    pub total_relocation_cost: Cost,
    pub total_overage_cost: Cost,
    pub total_service_cost: Cost,
    pub relocations: u32,
    pub services: u32,
    pub overage_km: Km,
    pub assigned_routes: u32,
    pub unassigned_routes: u32,
    pub unassigned_by_reason: HashMap<ReasonCode, u32>,
    pub wall_clock_seconds: f64,
    pub cancelled: bool,
    pub config: Config,
}

/// Everything one run produces: the placement map, the ordered assignment
/// log, the final per-vehicle state log, and the summary.
pub struct RunResult {
    pub placement: HashMap<VehicleId, LocationId>,
    pub assignments: Vec<AssignmentRecord>,
    pub vehicle_states: Vec<VehicleState>,
    pub summary: RunSummary,
}

fn summarize(store: &VehicleStateStore, records: &[AssignmentRecord], wall_clock: Duration, cancelled: bool, config: &Config) -> RunSummary {
    let mut total_relocation_cost = 0.0;
    let mut total_overage_cost = 0.0;
    let mut overage_km: Km = 0;
    let mut relocations = 0u32;
    let mut assigned_routes = 0u32;
    let mut unassigned_routes = 0u32;
    let mut unassigned_by_reason: HashMap<ReasonCode, u32> = HashMap::new();

    for record in records {
        match record {
            AssignmentRecord::Assigned { requires_relocation, relocation_cost, overage_cost, overage_km: km, .. } => {
                assigned_routes += 1;
                total_relocation_cost += relocation_cost;
                total_overage_cost += overage_cost;
                overage_km += km;
                if *requires_relocation {
                    relocations += 1;
                }
            }
            AssignmentRecord::Unassigned { reasons, .. } => {
                unassigned_routes += 1;
                for (reason, count) in reasons {
                    *unassigned_by_reason.entry(*reason).or_insert(0) += count;
                }
            }
        }
    }

    let vehicle_ids = store.vehicle_ids();
    let services: u32 = vehicle_ids.iter().map(|&v| store.state(v).total_service_count).sum();
    let total_service_cost: Cost = vehicle_ids.iter().map(|&v| store.state(v).total_service_cost).sum();

    RunSummary {
        total_cost: total_relocation_cost + total_overage_cost + total_service_cost,
        total_relocation_cost,
        total_overage_cost,
        total_service_cost,
        relocations,
        services,
        overage_km,
        assigned_routes,
        unassigned_routes,
        unassigned_by_reason,
        wall_clock_seconds: wall_clock.as_secs_f64(),
        cancelled,
        config: config.clone(),
    }
}

/// Runs Placement then Assignment end to end (§4.7). `is_cancelled` and
/// `wall_clock_budget` are both checked at the same between-routes
/// checkpoint (§5 "Cancellation / timeout"); either cuts the run short and
/// returns a partial log with `summary.cancelled = true`. Returns `Err` only
/// for an `Internal` invariant violation (§7); that kind aborts the run.
#[instrument(skip_all, fields(vehicles = vehicle_specs.len(), routes = routes.len()))]
pub fn execute(
    vehicle_specs: &[VehicleSpec],
    locations: &[Location],
    graph: &GraphIndex,
    routes: &[Route],
    config: &Config,
    progress: &dyn ProgressSink,
    mut is_cancelled: impl FnMut() -> bool,
    wall_clock_budget: Option<Duration>,
) -> Result<RunResult, EngineError> {
    let start = Instant::now();

    let placement = placement::place(vehicle_specs, routes, locations, &config.placement);
    progress.report(ProgressEvent::PlacementComplete { vehicles_placed: placement.len() as u32 });
    info!(vehicles_placed = placement.len(), "placement complete");

    let run_start_time = routes.iter().map(|r| r.start_time).min().unwrap_or_else(Utc::now);
    let store = VehicleStateStore::new(vehicle_specs, &placement, run_start_time);

    let windowed_routes = assignment_window(routes, config.assignment.assignment_lookahead_days, run_start_time);

    let mut combined_cancel = || is_cancelled() || wall_clock_budget.is_some_and(|budget| start.elapsed() >= budget);

    let output = assignment::assign(&store, &windowed_routes, graph, config, progress, &mut combined_cancel)?;

    let vehicle_states: Vec<VehicleState> = store.vehicle_ids().into_iter().map(|v| store.state(v)).collect();
    let summary = summarize(&store, &output.records, start.elapsed(), output.cancelled, config);

    progress.report(ProgressEvent::RunComplete {
        routes_processed: output.records.len() as u64,
        unassigned: summary.unassigned_routes as u64,
    });
    info!(total_cost = summary.total_cost, unassigned = summary.unassigned_routes, "run complete");

    Ok(RunResult {
        placement,
        assignments: output.records,
        vehicle_states,
        summary,
    })
}
