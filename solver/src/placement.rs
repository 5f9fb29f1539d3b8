use std::collections::HashMap;

use chrono::{DateTime, Utc};
use model::base_types::{LocationId, VehicleId};
use model::config::{PlacementConfig, PlacementStrategy};
use model::location::Location;
use model::route::Route;
use model::vehicle_spec::VehicleSpec;

/// Demand count per location within the first `lookahead_days` window,
/// keyed by `route.start_location_id` (§4.5 "Demand analysis").
fn demand_by_location(routes: &[Route], window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> HashMap<LocationId, u32> {
    let mut demand = HashMap::new();
    for route in routes {
        if route.start_time >= window_start && route.start_time < window_end {
            *demand.entry(route.start_location_id()).or_insert(0u32) += 1;
        }
    }
    demand
}

fn fallback_location(locations: &[Location]) -> LocationId {
    locations
        .iter()
        .find(|l| l.is_hub)
        .or_else(|| locations.first())
        .map(|l| l.id)
        .expect("at least one location is required to place a fleet")
}

/// Strategy A (§4.5): sort locations by descending demand, allocate
/// proportionally capped at the concentration limit, drain any remainder
/// into the highest-demand location that still has room, spilling onward.
fn place_proportional(
    vehicles: &[VehicleSpec],
    demand: &HashMap<LocationId, u32>,
    locations: &[Location],
    config: &PlacementConfig,
) -> HashMap<VehicleId, LocationId> {
    let fleet_size = vehicles.len() as u32;
    if demand.is_empty() {
        let fallback = fallback_location(locations);
        return vehicles.iter().map(|v| (v.id, fallback)).collect();
    }

    let total_demand: u32 = demand.values().sum();
    let cap = config
        .max_vehicles_per_location
        .unwrap_or_else(|| ((fleet_size as f64) * config.max_concentration).floor() as u32)
        .max(1);

    let mut ranked: Vec<(LocationId, u32)> = demand.iter().map(|(&loc, &d)| (loc, d)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut allocated: HashMap<LocationId, u32> = HashMap::new();
    let mut remaining = fleet_size;

    for &(location, d) in &ranked {
        if remaining == 0 {
            break;
        }
        let share = ((fleet_size as f64) * (d as f64) / (total_demand as f64)).floor() as u32;
        let share = share.max(1).min(remaining).min(cap);
        allocated.insert(location, share);
        remaining -= share;
    }

    // Spill targets: top-demand locations first, then every other known
    // location (zero demand, still capped) in ascending id order, so overflow
    // can spread across the whole location set rather than just the ones
    // that happened to have demand (§4.5 step 3, §9 "spill" fix).
    let demand_location_ids: std::collections::HashSet<LocationId> = ranked.iter().map(|(l, _)| *l).collect();
    let mut spill_targets: Vec<LocationId> = ranked.iter().map(|(l, _)| *l).collect();
    let mut other_locations: Vec<LocationId> = locations.iter().map(|l| l.id).filter(|id| !demand_location_ids.contains(id)).collect();
    other_locations.sort();
    spill_targets.extend(other_locations);

    let mut spill_index = 0;
    while remaining > 0 && !spill_targets.is_empty() {
        let mut progressed = false;
        for &location in spill_targets.iter().cycle().skip(spill_index).take(spill_targets.len()) {
            let current = *allocated.get(&location).unwrap_or(&0);
            if current < cap {
                *allocated.entry(location).or_insert(0) += 1;
                remaining -= 1;
                progressed = true;
                if remaining == 0 {
                    break;
                }
            }
        }
        spill_index += 1;
        if !progressed || spill_index > spill_targets.len() {
            // Every known location is at the cap: total capacity is below
            // fleet size. No legal placement exists under the cap, so the
            // unavoidable overflow lands on the top-demand location.
            let top = ranked[0].0;
            *allocated.entry(top).or_insert(0) += remaining;
            remaining = 0;
        }
    }

    let mut placement = HashMap::with_capacity(vehicles.len());
    let mut vehicles_iter = vehicles.iter();
    for &location in &spill_targets {
        for _ in 0..*allocated.get(&location).unwrap_or(&0) {
            if let Some(v) = vehicles_iter.next() {
                placement.insert(v.id, location);
            }
        }
    }
    // Any vehicle left unplaced due to rounding lands on the top-demand location.
    let top = ranked[0].0;
    for v in vehicles_iter {
        placement.insert(v.id, top);
    }
    placement
}

fn concentration_penalty(count_at_location: u32, cap: u32) -> f64 {
    let cap = cap.max(1) as f64;
    let count = count_at_location as f64;
    let soft_limit = 0.7 * cap;
    if count < soft_limit {
        0.0
    } else if count < cap {
        let over = count - soft_limit;
        let span = (cap - soft_limit).max(1.0);
        5000.0 * (over / span).powi(2)
    } else {
        let excess = count - cap + 1.0;
        5000.0 * excess.powf(1.5)
    }
}

/// Strategy B (§4.5): greedy argmin over a `|V| x |L|` cost matrix, updating
/// the running per-location count after each pick so later vehicles see the
/// concentration penalty their predecessors incurred.
fn place_cost_matrix(
    vehicles: &[VehicleSpec],
    demand: &HashMap<LocationId, u32>,
    locations: &[Location],
    config: &PlacementConfig,
) -> HashMap<VehicleId, LocationId> {
    if demand.is_empty() {
        let fallback = fallback_location(locations);
        return vehicles.iter().map(|v| (v.id, fallback)).collect();
    }

    let fleet_size = vehicles.len() as u32;
    let cap = config
        .max_vehicles_per_location
        .unwrap_or_else(|| ((fleet_size as f64) * config.max_concentration).floor() as u32)
        .max(1);

    let mut counts: HashMap<LocationId, u32> = HashMap::new();
    let mut placement = HashMap::with_capacity(vehicles.len());

    for v in vehicles {
        let best = locations
            .iter()
            .map(|l| {
                let d = *demand.get(&l.id).unwrap_or(&0) as f64;
                let assigned = *counts.get(&l.id).unwrap_or(&0);
                let cost = 1000.0 / (d + 2.0).ln() + concentration_penalty(assigned, cap);
                (l.id, cost)
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(id, _)| id)
            .unwrap_or_else(|| fallback_location(locations));

        *counts.entry(best).or_insert(0) += 1;
        placement.insert(v.id, best);
    }

    placement
}

/// Entry point for Phase 1 (§4.5). Every vehicle is placed exactly once.
pub fn place(
    vehicles: &[VehicleSpec],
    routes: &[Route],
    locations: &[Location],
    config: &PlacementConfig,
) -> HashMap<VehicleId, LocationId> {
    let window_start = match routes.iter().map(|r| r.start_time).min() {
        Some(t0) => t0,
        None => return vehicles.iter().map(|v| (v.id, fallback_location(locations))).collect(),
    };
    let window_end = window_start + chrono::Duration::days(config.lookahead_days);
    let demand = demand_by_location(routes, window_start, window_end);

    match config.strategy {
        PlacementStrategy::Proportional => place_proportional(vehicles, &demand, locations, config),
        PlacementStrategy::CostMatrix => place_cost_matrix(vehicles, &demand, locations, config),
    }
}
